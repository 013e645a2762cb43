pub mod auth;
pub mod grants;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod users;
