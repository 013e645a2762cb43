use castellan_application::{PermissionMatrix, PermissionMatrixRow};
use castellan_domain::PermissionDefinition;
use serde::{Deserialize, Serialize};

/// Incoming payload for creating or editing a catalog permission.
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub code: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// API representation of a catalog permission.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub permission_id: String,
    pub code: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

/// Cell of the modules × actions grid; `permission` is absent when not in the catalog.
#[derive(Debug, Serialize)]
pub struct PermissionMatrixCellResponse {
    pub action: &'static str,
    pub permission: Option<PermissionResponse>,
}

/// One module row of the grid.
#[derive(Debug, Serialize)]
pub struct PermissionMatrixRowResponse {
    pub module: &'static str,
    pub cells: Vec<PermissionMatrixCellResponse>,
}

/// The full grid plus catalog wildcard entries.
#[derive(Debug, Serialize)]
pub struct PermissionMatrixResponse {
    pub rows: Vec<PermissionMatrixRowResponse>,
    pub wildcard_entries: Vec<PermissionResponse>,
}

impl From<PermissionDefinition> for PermissionResponse {
    fn from(value: PermissionDefinition) -> Self {
        Self {
            permission_id: value.id().to_string(),
            code: value.code().to_string(),
            display_name: value.display_name().to_string(),
            description: value.description().map(str::to_owned),
            is_system: value.is_system(),
        }
    }
}

impl From<PermissionMatrixRow> for PermissionMatrixRowResponse {
    fn from(value: PermissionMatrixRow) -> Self {
        Self {
            module: value.module.as_str(),
            cells: value
                .cells
                .into_iter()
                .map(|cell| PermissionMatrixCellResponse {
                    action: cell.action.as_str(),
                    permission: cell.permission.map(PermissionResponse::from),
                })
                .collect(),
        }
    }
}

impl From<PermissionMatrix> for PermissionMatrixResponse {
    fn from(value: PermissionMatrix) -> Self {
        Self {
            rows: value
                .rows
                .into_iter()
                .map(PermissionMatrixRowResponse::from)
                .collect(),
            wildcard_entries: value
                .wildcard_entries
                .into_iter()
                .map(PermissionResponse::from)
                .collect(),
        }
    }
}
