use std::sync::Arc;

use castellan_application::{
    AuditRepository, AuthorizationService, PasswordHasher, PermissionCatalogService,
    PermissionRepository, PermissionResolver, RevokedTokenRepository, RoleAssignmentLedger,
    RoleGraphService, RoleRepository, SecurityAdminService, SessionService,
    TokenRevocationRegistry, UserDirectory, UserRoleRepository, UserScopeRepository,
};
use castellan_core::{AppError, AppResult};
use castellan_domain::LegacyPermissionMatrix;
use castellan_infrastructure::{
    Argon2PasswordHasher, InMemoryAccessStore, JwtSessionTokenCodec, PostgresAuditRepository,
    PostgresPermissionRepository, PostgresRevokedTokenRepository, PostgresRoleRepository,
    PostgresUserRepository, PostgresUserRoleRepository, PostgresUserScopeRepository,
};
use chrono::Duration;
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Every storage port the engine needs, backed by one store.
#[derive(Clone)]
pub struct AccessPorts {
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub grants: Arc<dyn UserRoleRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub scopes: Arc<dyn UserScopeRepository>,
    pub revoked_tokens: Arc<dyn RevokedTokenRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl AccessPorts {
    pub fn in_memory(store: Arc<InMemoryAccessStore>) -> Self {
        Self {
            roles: store.clone(),
            permissions: store.clone(),
            grants: store.clone(),
            users: store.clone(),
            scopes: store.clone(),
            revoked_tokens: store.clone(),
            audit: store,
        }
    }

    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            roles: Arc::new(PostgresRoleRepository::new(pool.clone())),
            permissions: Arc::new(PostgresPermissionRepository::new(pool.clone())),
            grants: Arc::new(PostgresUserRoleRepository::new(pool.clone())),
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            scopes: Arc::new(PostgresUserScopeRepository::new(pool.clone())),
            revoked_tokens: Arc::new(PostgresRevokedTokenRepository::new(pool.clone())),
            audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
        }
    }
}

/// Wired services shared by the router and startup seeding.
#[derive(Clone)]
pub struct EngineServices {
    pub roles: RoleGraphService,
    pub catalog: PermissionCatalogService,
    pub ledger: RoleAssignmentLedger,
    pub session_service: SessionService,
    pub security_admin_service: SecurityAdminService,
    pub users: Arc<dyn UserDirectory>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

impl EngineServices {
    pub fn app_state(&self) -> AppState {
        AppState {
            security_admin_service: self.security_admin_service.clone(),
            session_service: self.session_service.clone(),
        }
    }
}

pub fn build_engine_services(
    ports: &AccessPorts,
    config: &ApiConfig,
    password_hasher: Arc<dyn PasswordHasher>,
) -> AppResult<EngineServices> {
    let legacy_matrix = if config.legacy_matrix_enabled {
        LegacyPermissionMatrix::standard()?
    } else {
        LegacyPermissionMatrix::disabled()
    };
    let token_codec = JwtSessionTokenCodec::new(
        config.jwt_secret.as_str(),
        config.jwt_issuer.clone(),
        Duration::try_seconds(config.jwt_ttl_seconds).ok_or_else(|| {
            AppError::Validation("JWT_TTL_SECONDS is out of range".to_owned())
        })?,
    )?;

    let roles = RoleGraphService::new(ports.roles.clone());
    let catalog = PermissionCatalogService::new(ports.permissions.clone(), Arc::new(legacy_matrix));
    let ledger = RoleAssignmentLedger::new(
        ports.grants.clone(),
        ports.users.clone(),
        ports.roles.clone(),
    );
    let resolver = PermissionResolver::new(roles.clone(), ledger.clone(), catalog.clone());
    let session_service = SessionService::new(
        ports.users.clone(),
        password_hasher.clone(),
        Arc::new(token_codec),
        resolver.clone(),
        TokenRevocationRegistry::new(ports.revoked_tokens.clone()),
        ports.audit.clone(),
    );
    let security_admin_service = SecurityAdminService::new(
        AuthorizationService::new(resolver, ports.scopes.clone()),
        roles.clone(),
        catalog.clone(),
        ledger.clone(),
        session_service.clone(),
        ports.audit.clone(),
    );

    Ok(EngineServices {
        roles,
        catalog,
        ledger,
        session_service,
        security_admin_service,
        users: ports.users.clone(),
        password_hasher,
    })
}

pub fn default_password_hasher() -> Arc<dyn PasswordHasher> {
    Arc::new(Argon2PasswordHasher::new())
}
