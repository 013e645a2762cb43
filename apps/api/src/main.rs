//! Castellan API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use castellan_core::AppError;
use castellan_infrastructure::InMemoryAccessStore;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageConfig};
use crate::api_services::AccessPorts;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    let ports = match &config.storage {
        StorageConfig::Postgres { database_url } => {
            let pool = api_services::connect(database_url).await?;
            api_services::run_migrations(&pool).await?;
            if config.migrate_only {
                return Ok(());
            }
            AccessPorts::postgres(&pool)
        }
        StorageConfig::Memory => {
            warn!("DATABASE_URL not set; using the in-memory access store");
            AccessPorts::in_memory(Arc::new(InMemoryAccessStore::new()))
        }
    };

    let engine =
        api_services::build_engine_services(&ports, &config, api_services::default_password_hasher())?;
    engine.catalog.ensure_system_permissions().await?;

    if let Some(admin) = &config.bootstrap_admin {
        api_services::seed_bootstrap_admin(&engine, admin).await?;
    } else if config.storage == StorageConfig::Memory {
        warn!("no BOOTSTRAP_ADMIN_USERNAME configured; the in-memory store has no users");
    }

    let app = api_router::build_router(engine.app_state(), &config.frontend_url)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(
        %address,
        storage = config.storage_label(),
        legacy_matrix = config.legacy_matrix_enabled,
        "castellan api listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server failed: {error}")))
}
