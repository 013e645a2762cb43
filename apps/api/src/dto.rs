mod auth;
mod common;
mod grants;
mod permissions;
mod roles;
mod users;

pub use auth::{ChangePasswordRequest, LoginRequest, LoginResponse, SessionResponse};
pub use common::HealthResponse;
pub use grants::{
    AssignRoleRequest, GrantResponse, ListUserRolesQuery, RevokeRoleQuery, UpdateRoleGrantRequest,
};
pub use permissions::{PermissionMatrixResponse, PermissionRequest, PermissionResponse};
pub use roles::{
    CreateRoleRequest, ResolvedPermissionResponse, RoleResponse, RoleTreeNodeResponse,
    UpdateRoleRequest,
};
pub use users::{
    AuthorizeRequest, AuthorizeResponse, EffectivePermissionsResponse, ReplaceScopesRequest,
    ScopeRequest, ScopeResponse,
};
