mod audit;
mod credentials;
mod grants;
mod permissions;
mod revocations;
mod roles;
mod scopes;
mod users;

pub use audit::{AuditEvent, AuditRepository};
pub use credentials::{IssuedSession, PasswordHasher, SessionClaims, SessionTokenCodec};
pub use grants::UserRoleRepository;
pub use permissions::{PermissionInput, PermissionRepository};
pub use revocations::RevokedTokenRepository;
pub use roles::{CreateRoleInput, RoleChanges, RoleDeletionBlockers, RoleRepository};
pub use scopes::UserScopeRepository;
pub use users::{UserAccount, UserDirectory};
