use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{AuditAction, Role, RoleId};

use super::SecurityAdminService;
use crate::{CreateRoleInput, ResolvedPermission, RoleChanges, RoleTreeNode};

impl SecurityAdminService {
    /// Lists roles. Requires `role:read`.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<Role>> {
        self.require(actor, "role:read").await?;
        self.roles.list_roles().await
    }

    /// Loads one role. Requires `role:read`.
    pub async fn find_role(&self, actor: &UserIdentity, role_id: RoleId) -> AppResult<Role> {
        self.require(actor, "role:read").await?;
        self.roles.find_role(role_id).await
    }

    /// Returns the role forest. Requires `role:read`.
    pub async fn role_hierarchy(&self, actor: &UserIdentity) -> AppResult<Vec<RoleTreeNode>> {
        self.require(actor, "role:read").await?;
        self.roles.role_hierarchy().await
    }

    /// Returns direct and inherited permissions of a role. Requires `role:read`.
    pub async fn role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
    ) -> AppResult<Vec<ResolvedPermission>> {
        self.require(actor, "role:read").await?;
        self.authorization
            .resolver()
            .role_permissions(role_id)
            .await
    }

    /// Creates a role. Requires `role:create`.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        self.require(actor, "role:create").await?;
        let role = self.roles.create_role(input).await?;

        self.record(
            actor,
            AuditAction::RoleCreated,
            "role",
            role.id().to_string(),
            format!("created role {}", role.name()),
        )
        .await?;

        Ok(role)
    }

    /// Edits a role, including its parent. Requires `role:update`.
    pub async fn update_role(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<Role> {
        self.require(actor, "role:update").await?;
        let moved = changes.moves_role();
        let role = self.roles.update_role(role_id, changes).await?;

        let detail = match (moved, role.parent_id()) {
            (true, Some(parent_id)) => {
                format!("updated role {}; moved under {parent_id}", role.name())
            }
            (true, None) => format!("updated role {}; moved to root", role.name()),
            (false, _) => format!("updated role {}", role.name()),
        };
        self.record(
            actor,
            AuditAction::RoleUpdated,
            "role",
            role.id().to_string(),
            detail,
        )
        .await?;

        Ok(role)
    }

    /// Deletes a leaf role nobody holds. Requires `role:delete`.
    pub async fn delete_role(&self, actor: &UserIdentity, role_id: RoleId) -> AppResult<()> {
        self.require(actor, "role:delete").await?;
        let role = self.roles.find_role(role_id).await?;
        self.roles.delete_role(role_id).await?;

        self.record(
            actor,
            AuditAction::RoleDeleted,
            "role",
            role_id.to_string(),
            format!("deleted role {}", role.name()),
        )
        .await
    }
}
