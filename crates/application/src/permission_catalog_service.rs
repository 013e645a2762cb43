use std::str::FromStr;
use std::sync::Arc;

use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{
    LegacyPermissionMatrix, PermissionAction, PermissionCode, PermissionDefinition, PermissionId,
    PermissionModule, SYSTEM_RESERVED_PERMISSIONS, is_valid_permission,
};
use tracing::info;

use crate::{PermissionInput, PermissionRepository};

/// One cell of the modules × actions grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrixCell {
    /// Column action.
    pub action: PermissionAction,
    /// Catalog entry for `module:action`, if one exists.
    pub permission: Option<PermissionDefinition>,
}

/// One module row of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrixRow {
    /// Row module.
    pub module: PermissionModule,
    /// One cell per action, in catalog order.
    pub cells: Vec<PermissionMatrixCell>,
}

/// Modules × actions grid over the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    /// Rows in catalog order.
    pub rows: Vec<PermissionMatrixRow>,
    /// Entries with a wildcard on either side; they have no single cell.
    pub wildcard_entries: Vec<PermissionDefinition>,
}

/// Enumerates, validates and protects catalog permissions.
#[derive(Clone)]
pub struct PermissionCatalogService {
    permissions: Arc<dyn PermissionRepository>,
    legacy_matrix: Arc<LegacyPermissionMatrix>,
}

impl PermissionCatalogService {
    /// Creates the catalog with the injected legacy base matrix.
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionRepository>,
        legacy_matrix: Arc<LegacyPermissionMatrix>,
    ) -> Self {
        Self {
            permissions,
            legacy_matrix,
        }
    }

    /// Returns whether a permission string is well formed.
    #[must_use]
    pub fn validate(&self, permission: &str) -> bool {
        is_valid_permission(permission)
    }

    /// Returns whether `module:action` is a reserved pair. Unknown values are never reserved.
    #[must_use]
    pub fn is_system_reserved(&self, module: &str, action: &str) -> bool {
        match (
            PermissionModule::from_str(module),
            PermissionAction::from_str(action),
        ) {
            (Ok(module), Ok(action)) => castellan_domain::is_system_reserved(module, action),
            _ => false,
        }
    }

    /// Builds a code from its halves, each a known value or `*`.
    pub fn build_code(&self, module: &str, action: &str) -> AppResult<PermissionCode> {
        PermissionCode::parse(&format!("{module}:{action}"))
    }

    /// Returns the legacy base matrix.
    #[must_use]
    pub fn legacy_matrix(&self) -> &LegacyPermissionMatrix {
        self.legacy_matrix.as_ref()
    }

    /// Lists every catalog entry.
    pub async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.permissions.list_permissions().await
    }

    /// Returns one entry or `NotFound`.
    pub async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDefinition> {
        self.permissions
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission '{permission_id}' not found")))
    }

    /// Adds an entry. Reserved codes are seeded only.
    pub async fn create_permission(&self, input: PermissionInput) -> AppResult<PermissionDefinition> {
        reject_reserved_code(input.code)?;

        let permission = self
            .permissions
            .create_permission(PermissionDefinition::new(
                PermissionId::new(),
                input.code,
                input.display_name,
                input.description,
            ))
            .await?;
        info!(permission_id = %permission.id(), code = %permission.code(), "permission created");

        Ok(permission)
    }

    /// Edits an entry. Neither the target nor the new code may be reserved.
    pub async fn update_permission(
        &self,
        permission_id: PermissionId,
        input: PermissionInput,
    ) -> AppResult<PermissionDefinition> {
        let existing = self.find_permission(permission_id).await?;
        if existing.is_system() {
            return Err(ConstraintViolation::SystemReserved(existing.code().to_string()).into());
        }
        reject_reserved_code(input.code)?;

        let permission = self
            .permissions
            .update_permission(PermissionDefinition::new(
                permission_id,
                input.code,
                input.display_name,
                input.description,
            ))
            .await?;
        info!(permission_id = %permission_id, code = %permission.code(), "permission updated");

        Ok(permission)
    }

    /// Deletes an entry that is neither reserved nor referenced by a role.
    pub async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let existing = self.find_permission(permission_id).await?;
        if existing.is_system() {
            return Err(ConstraintViolation::SystemReserved(existing.code().to_string()).into());
        }

        self.permissions.delete_permission(permission_id).await?;
        info!(permission_id = %permission_id, code = %existing.code(), "permission deleted");
        Ok(())
    }

    /// Seeds the reserved table. Safe to call on every start.
    pub async fn ensure_system_permissions(&self) -> AppResult<u64> {
        let seeds = SYSTEM_RESERVED_PERMISSIONS
            .iter()
            .map(|(module, action)| PermissionDefinition::system(*module, *action))
            .collect::<AppResult<Vec<_>>>()?;

        let inserted = self.permissions.ensure_permissions(seeds).await?;
        if inserted > 0 {
            info!(inserted, "seeded system permissions");
        }

        Ok(inserted)
    }

    /// Builds the modules × actions grid.
    pub async fn permission_matrix(&self) -> AppResult<PermissionMatrix> {
        let permissions = self.permissions.list_permissions().await?;

        let rows = PermissionModule::all()
            .iter()
            .map(|module| PermissionMatrixRow {
                module: *module,
                cells: PermissionAction::all()
                    .iter()
                    .map(|action| PermissionMatrixCell {
                        action: *action,
                        permission: permissions
                            .iter()
                            .find(|permission| {
                                permission.code() == PermissionCode::new(*module, *action)
                            })
                            .cloned(),
                    })
                    .collect(),
            })
            .collect();

        let wildcard_entries = permissions
            .into_iter()
            .filter(|permission| permission.code().is_wildcard())
            .collect();

        Ok(PermissionMatrix {
            rows,
            wildcard_entries,
        })
    }
}

fn reject_reserved_code(code: PermissionCode) -> AppResult<()> {
    if code.is_system_reserved() {
        return Err(ConstraintViolation::SystemReserved(code.to_string()).into());
    }

    Ok(())
}
