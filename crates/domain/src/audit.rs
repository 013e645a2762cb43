use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by the administration use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A role was created.
    RoleCreated,
    /// A role was renamed, relabelled, moved or had its permissions replaced.
    RoleUpdated,
    /// A role was deleted.
    RoleDeleted,
    /// A catalog permission was created.
    PermissionCreated,
    /// A catalog permission was edited.
    PermissionUpdated,
    /// A catalog permission was deleted.
    PermissionDeleted,
    /// A role was granted to a user.
    RoleGrantAssigned,
    /// A grant was revoked.
    RoleGrantRevoked,
    /// A grant's priority, validity or reason changed.
    RoleGrantUpdated,
    /// The sweep closed lapsed grants.
    RoleGrantsExpired,
    /// A user's scope restrictions were replaced.
    UserScopesReplaced,
    /// All sessions of a user were revoked by an administrator.
    SessionsTerminated,
    /// A user changed their password.
    PasswordChanged,
}

impl AuditAction {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "security.role.created",
            Self::RoleUpdated => "security.role.updated",
            Self::RoleDeleted => "security.role.deleted",
            Self::PermissionCreated => "security.permission.created",
            Self::PermissionUpdated => "security.permission.updated",
            Self::PermissionDeleted => "security.permission.deleted",
            Self::RoleGrantAssigned => "security.grant.assigned",
            Self::RoleGrantRevoked => "security.grant.revoked",
            Self::RoleGrantUpdated => "security.grant.updated",
            Self::RoleGrantsExpired => "security.grant.expired",
            Self::UserScopesReplaced => "security.scope.replaced",
            Self::SessionsTerminated => "security.session.terminated",
            Self::PasswordChanged => "security.password.changed",
        }
    }
}
