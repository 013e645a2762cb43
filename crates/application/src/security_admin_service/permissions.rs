use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{AuditAction, PermissionDefinition, PermissionId};

use super::SecurityAdminService;
use crate::{PermissionInput, PermissionMatrix};

impl SecurityAdminService {
    /// Lists the catalog. Requires `permission:read`.
    pub async fn list_permissions(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.require(actor, "permission:read").await?;
        self.catalog.list_permissions().await
    }

    /// Returns the modules × actions grid. Requires `permission:read`.
    pub async fn permission_matrix(&self, actor: &UserIdentity) -> AppResult<PermissionMatrix> {
        self.require(actor, "permission:read").await?;
        self.catalog.permission_matrix().await
    }

    /// Adds a catalog entry. Requires `permission:create`.
    pub async fn create_permission(
        &self,
        actor: &UserIdentity,
        input: PermissionInput,
    ) -> AppResult<PermissionDefinition> {
        self.require(actor, "permission:create").await?;
        let permission = self.catalog.create_permission(input).await?;

        self.record(
            actor,
            AuditAction::PermissionCreated,
            "permission",
            permission.id().to_string(),
            format!("created permission {}", permission.code()),
        )
        .await?;

        Ok(permission)
    }

    /// Edits a catalog entry. Requires `permission:update`.
    pub async fn update_permission(
        &self,
        actor: &UserIdentity,
        permission_id: PermissionId,
        input: PermissionInput,
    ) -> AppResult<PermissionDefinition> {
        self.require(actor, "permission:update").await?;
        let permission = self
            .catalog
            .update_permission(permission_id, input)
            .await?;

        self.record(
            actor,
            AuditAction::PermissionUpdated,
            "permission",
            permission_id.to_string(),
            format!("updated permission {}", permission.code()),
        )
        .await?;

        Ok(permission)
    }

    /// Removes a catalog entry. Requires `permission:delete`.
    pub async fn delete_permission(
        &self,
        actor: &UserIdentity,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.require(actor, "permission:delete").await?;
        let permission = self.catalog.find_permission(permission_id).await?;
        self.catalog.delete_permission(permission_id).await?;

        self.record(
            actor,
            AuditAction::PermissionDeleted,
            "permission",
            permission_id.to_string(),
            format!("deleted permission {}", permission.code()),
        )
        .await
    }
}
