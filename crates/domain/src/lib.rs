//! Entities and invariants of the authorization engine.

#![forbid(unsafe_code)]

mod audit;
mod grant;
mod legacy_matrix;
mod permission;
mod revocation;
mod role;
mod role_hierarchy;
mod scope;
mod user;

pub use audit::AuditAction;
pub use grant::{
    AUTO_EXPIRED_REASON, GrantAmendment, GrantId, GrantPriority, GrantRecord, GrantStatus,
    NewGrant, UserRoleGrant, highest_priority,
};
pub use legacy_matrix::LegacyPermissionMatrix;
pub use permission::{
    PermissionAction, PermissionCode, PermissionDefinition, PermissionId, PermissionModule,
    SYSTEM_RESERVED_PERMISSIONS, Selector, WILDCARD, any_grants, is_super_admin,
    is_system_reserved, is_valid_permission, permission_grants,
};
pub use revocation::{
    ALL_SESSIONS_MARKER, RevocationMarker, RevocationReason, RevocationTarget, is_token_valid,
};
pub use role::{MAX_ROLE_LEVELS, Role, RoleId};
pub use role_hierarchy::RoleHierarchy;
pub use scope::{ScopeCondition, ScopeConditions, ScopeDecision, UserScope, evaluate_scopes};
pub use user::{
    EmailAddress, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, UserId, validate_password,
};
