//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_access_store;
mod jwt_session_token_codec;
mod postgres_audit_repository;
mod postgres_permission_repository;
mod postgres_revoked_token_repository;
mod postgres_role_repository;
mod postgres_user_repository;
mod postgres_user_role_repository;
mod postgres_user_scope_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_access_store::InMemoryAccessStore;
pub use jwt_session_token_codec::{
    JwtSessionTokenCodec, MAX_SESSION_TTL_SECONDS, MIN_SECRET_LENGTH,
};
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_permission_repository::PostgresPermissionRepository;
pub use postgres_revoked_token_repository::PostgresRevokedTokenRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_user_repository::PostgresUserRepository;
pub use postgres_user_role_repository::PostgresUserRoleRepository;
pub use postgres_user_scope_repository::PostgresUserScopeRepository;

/// Embedded SQL migrations for the Postgres adapters.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
