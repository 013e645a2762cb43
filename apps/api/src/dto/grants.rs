use castellan_domain::UserRoleGrant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for granting a role to a user.
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
    pub reason: Option<String>,
}

/// Incoming payload for amending an active grant.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleGrantRequest {
    pub priority: Option<i32>,
    pub valid_to: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Query string of the grant listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListUserRolesQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Query string of a revocation.
#[derive(Debug, Default, Deserialize)]
pub struct RevokeRoleQuery {
    pub reason: Option<String>,
}

/// API representation of a role grant.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub grant_id: String,
    pub user_id: String,
    pub role_id: String,
    pub valid_from: String,
    pub valid_to: Option<String>,
    pub priority: i32,
    pub status: &'static str,
    pub assigned_by: Option<String>,
    pub assigned_reason: Option<String>,
    pub updated_by: Option<String>,
    pub revoked_by: Option<String>,
    pub revoked_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRoleGrant> for GrantResponse {
    fn from(value: UserRoleGrant) -> Self {
        Self {
            grant_id: value.id().to_string(),
            user_id: value.user_id().to_string(),
            role_id: value.role_id().to_string(),
            valid_from: value.valid_from().to_rfc3339(),
            valid_to: value.valid_to().map(|valid_to| valid_to.to_rfc3339()),
            priority: value.priority().value(),
            status: value.status().as_str(),
            assigned_by: value.assigned_by().map(|user_id| user_id.to_string()),
            assigned_reason: value.assigned_reason().map(str::to_owned),
            updated_by: value.updated_by().map(|user_id| user_id.to_string()),
            revoked_by: value.revoked_by().map(|user_id| user_id.to_string()),
            revoked_reason: value.revoked_reason().map(str::to_owned),
            created_at: value.created_at().to_rfc3339(),
            updated_at: value.updated_at().to_rfc3339(),
        }
    }
}
