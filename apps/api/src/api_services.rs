mod bootstrap;
mod database;
mod state_builder;

pub use bootstrap::seed_bootstrap_admin;
pub use database::{connect, run_migrations};
pub use state_builder::{
    AccessPorts, EngineServices, build_engine_services, default_password_hasher,
};
