use castellan_application::EffectivePermissions;
use castellan_domain::UserScope;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{GrantResponse, ResolvedPermissionResponse, RoleResponse};

/// Incoming payload for an authorization check. Without `user_id` the caller is checked.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub user_id: Option<Uuid>,
    pub permission: String,
    pub resource_scope: Option<Map<String, Value>>,
}

/// Outcome of an authorization check.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
}

/// One scope restriction; without `permission` the row narrows every permission.
#[derive(Debug, Deserialize)]
pub struct ScopeRequest {
    pub permission: Option<String>,
    #[serde(default = "empty_conditions")]
    pub conditions: Value,
}

/// Replacement set of scope restrictions.
#[derive(Debug, Deserialize)]
pub struct ReplaceScopesRequest {
    pub scopes: Vec<ScopeRequest>,
}

/// API representation of a scope restriction.
#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub scope_id: String,
    pub permission: Option<String>,
    pub conditions: Value,
}

/// Effective permissions with the grants and roles they come from.
#[derive(Debug, Serialize)]
pub struct EffectivePermissionsResponse {
    pub user_id: String,
    pub primary_role: Option<String>,
    pub permissions: Vec<String>,
    pub details: Vec<ResolvedPermissionResponse>,
    pub roles: Vec<RoleResponse>,
    pub grants: Vec<GrantResponse>,
}

fn empty_conditions() -> Value {
    Value::Object(Map::new())
}

impl From<UserScope> for ScopeResponse {
    fn from(value: UserScope) -> Self {
        Self {
            scope_id: value.id().to_string(),
            permission: value.permission().map(|permission| permission.to_string()),
            conditions: value.conditions().to_json(),
        }
    }
}

impl From<EffectivePermissions> for EffectivePermissionsResponse {
    fn from(value: EffectivePermissions) -> Self {
        let primary_role = value.primary_role_name().map(str::to_owned);
        Self {
            user_id: value.user_id.to_string(),
            primary_role,
            permissions: value.permissions.into_iter().collect(),
            details: value
                .details
                .into_iter()
                .map(ResolvedPermissionResponse::from)
                .collect(),
            roles: value.roles.into_iter().map(RoleResponse::from).collect(),
            grants: value.grants.into_iter().map(GrantResponse::from).collect(),
        }
    }
}
