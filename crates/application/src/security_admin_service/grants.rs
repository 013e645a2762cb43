use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{AuditAction, GrantAmendment, RoleId, UserId, UserRoleGrant};

use super::{SecurityAdminService, actor_id};
use crate::AssignRoleInput;

impl SecurityAdminService {
    /// Grants a role on behalf of the caller. Requires `user:manage`.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        input: AssignRoleInput,
    ) -> AppResult<UserRoleGrant> {
        self.require(actor, "user:manage").await?;
        let grant = self
            .ledger
            .assign(AssignRoleInput {
                assigned_by: Some(actor_id(actor)),
                ..input
            })
            .await?;

        self.record(
            actor,
            AuditAction::RoleGrantAssigned,
            "user_role",
            grant.id().to_string(),
            format!(
                "granted role {} to user {} with priority {}",
                grant.role_id(),
                grant.user_id(),
                grant.priority().value()
            ),
        )
        .await?;

        Ok(grant)
    }

    /// Revokes the active grant of a role. Requires `user:manage`.
    pub async fn revoke_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_id: RoleId,
        reason: Option<String>,
    ) -> AppResult<UserRoleGrant> {
        self.require(actor, "user:manage").await?;
        let grant = self
            .ledger
            .revoke(user_id, role_id, Some(actor_id(actor)), reason)
            .await?;

        self.record(
            actor,
            AuditAction::RoleGrantRevoked,
            "user_role",
            grant.id().to_string(),
            format!("revoked role {role_id} from user {user_id}"),
        )
        .await?;

        Ok(grant)
    }

    /// Amends the active grant of a role. Requires `user:manage`.
    pub async fn update_role_grant(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_id: RoleId,
        amendment: GrantAmendment,
    ) -> AppResult<UserRoleGrant> {
        self.require(actor, "user:manage").await?;
        let grant = self
            .ledger
            .update(
                user_id,
                role_id,
                GrantAmendment {
                    updated_by: Some(actor_id(actor)),
                    ..amendment
                },
            )
            .await?;

        self.record(
            actor,
            AuditAction::RoleGrantUpdated,
            "user_role",
            grant.id().to_string(),
            format!(
                "updated grant of role {role_id} for user {user_id}; priority {}",
                grant.priority().value()
            ),
        )
        .await?;

        Ok(grant)
    }

    /// Lists grants of a user. Users may read their own; others need `user:read`.
    pub async fn list_user_roles(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>> {
        self.require_self_or(actor, user_id, "user:read").await?;
        self.ledger.list_user_roles(user_id, active_only).await
    }
}
