use castellan_application::{PermissionSource, ResolvedPermission, RoleTreeNode};
use castellan_domain::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::double_option;

/// Incoming payload for role creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Incoming payload for role edits. Absent fields stay unchanged; `"parent_id": null` detaches.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub permission_ids: Option<Vec<Uuid>>,
}

/// API representation of a role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One node of the role forest.
#[derive(Debug, Serialize)]
pub struct RoleTreeNodeResponse {
    #[serde(flatten)]
    pub role: RoleResponse,
    pub level: usize,
    pub children: Vec<RoleTreeNodeResponse>,
}

/// A role permission with provenance.
#[derive(Debug, Serialize)]
pub struct ResolvedPermissionResponse {
    pub permission: String,
    pub source: &'static str,
    pub role_id: Option<String>,
    pub role_name: String,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.id().to_string(),
            name: value.name().to_string(),
            display_name: value.display_name().to_string(),
            description: value.description().map(str::to_owned),
            parent_id: value.parent_id().map(|parent_id| parent_id.to_string()),
            created_at: value.created_at().to_rfc3339(),
            updated_at: value.updated_at().to_rfc3339(),
        }
    }
}

impl From<RoleTreeNode> for RoleTreeNodeResponse {
    fn from(value: RoleTreeNode) -> Self {
        Self {
            role: RoleResponse::from(value.role),
            level: value.level,
            children: value.children.into_iter().map(Self::from).collect(),
        }
    }
}

impl From<ResolvedPermission> for ResolvedPermissionResponse {
    fn from(value: ResolvedPermission) -> Self {
        let (source, role_id, role_name) = match value.source {
            PermissionSource::Direct { role_id, role_name } => {
                ("direct", Some(role_id.to_string()), role_name)
            }
            PermissionSource::Inherited { role_id, role_name } => {
                ("inherited", Some(role_id.to_string()), role_name)
            }
            PermissionSource::Legacy { role_name } => ("legacy", None, role_name),
        };

        Self {
            permission: value.permission,
            source,
            role_id,
            role_name,
        }
    }
}
