//! Application services and ports of the authorization engine.

#![forbid(unsafe_code)]

mod access_ports;
mod authorization_service;
mod housekeeping_service;
mod permission_catalog_service;
mod permission_resolver;
mod role_assignment_ledger;
mod role_graph_service;
mod security_admin_service;
mod session_service;
mod token_revocation_registry;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    AuditEvent, AuditRepository, CreateRoleInput, IssuedSession, PasswordHasher,
    PermissionInput, PermissionRepository, RevokedTokenRepository, RoleChanges,
    RoleDeletionBlockers, RoleRepository, SessionClaims, SessionTokenCodec, UserAccount,
    UserDirectory, UserRoleRepository, UserScopeRepository,
};
pub use authorization_service::{AuthorizationService, ScopeInput};
pub use housekeeping_service::{HousekeepingReport, HousekeepingService, SYSTEM_SUBJECT};
pub use permission_catalog_service::{
    PermissionCatalogService, PermissionMatrix, PermissionMatrixCell, PermissionMatrixRow,
};
pub use permission_resolver::{
    EffectivePermissions, PermissionResolver, PermissionSource, ResolvedPermission,
};
pub use role_assignment_ledger::{AssignRoleInput, RoleAssignmentLedger};
pub use role_graph_service::{RoleGraphService, RoleTreeNode};
pub use security_admin_service::SecurityAdminService;
pub use session_service::{AuthenticatedSession, SessionService};
pub use token_revocation_registry::TokenRevocationRegistry;
