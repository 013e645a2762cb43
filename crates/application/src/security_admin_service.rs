//! Administration facade over the engine.
//!
//! Every operation first checks a permission of the caller, then delegates, then appends an
//! audit event for mutations.

use std::sync::Arc;

use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{AuditAction, UserId};

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, PermissionCatalogService,
    RoleAssignmentLedger, RoleGraphService, SessionService,
};

mod grants;
mod permissions;
mod roles;
mod users;

/// Application service for role, permission, grant, scope and session administration.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization: AuthorizationService,
    roles: RoleGraphService,
    catalog: PermissionCatalogService,
    ledger: RoleAssignmentLedger,
    sessions: SessionService,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates the facade.
    #[must_use]
    pub fn new(
        authorization: AuthorizationService,
        roles: RoleGraphService,
        catalog: PermissionCatalogService,
        ledger: RoleAssignmentLedger,
        sessions: SessionService,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization,
            roles,
            catalog,
            ledger,
            sessions,
            audit_repository,
        }
    }

    async fn require(&self, actor: &UserIdentity, permission: &str) -> AppResult<()> {
        self.authorization
            .authorize(actor_id(actor), permission, None)
            .await
    }

    /// Lets users read their own data; anyone else needs `permission`.
    async fn require_self_or(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        permission: &str,
    ) -> AppResult<()> {
        if actor_id(actor) == user_id {
            return Ok(());
        }

        self.require(actor, permission).await
    }

    async fn record(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                subject: actor.username().to_owned(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                detail: Some(detail),
            })
            .await
    }
}

fn actor_id(actor: &UserIdentity) -> UserId {
    UserId::from_uuid(actor.user_id())
}

#[cfg(test)]
mod tests;
