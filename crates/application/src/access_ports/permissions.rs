use async_trait::async_trait;
use castellan_core::{AppResult, NonEmptyString};
use castellan_domain::{PermissionCode, PermissionDefinition, PermissionId};

/// Input payload for creating or editing a catalog permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInput {
    /// Permission code; wildcards are allowed.
    pub code: PermissionCode,
    /// Display name.
    pub display_name: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
}

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Lists every catalog entry.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Finds one entry.
    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>>;

    /// Inserts an entry. Fails with `Conflict` on a duplicate code.
    async fn create_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition>;

    /// Replaces an entry. Fails with `Conflict` on a duplicate code.
    async fn update_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition>;

    /// Deletes an entry. Fails with `PermissionInUse` while any role references it.
    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()>;

    /// Inserts the entries whose code is not stored yet. Returns how many were added.
    async fn ensure_permissions(&self, permissions: Vec<PermissionDefinition>) -> AppResult<u64>;
}
