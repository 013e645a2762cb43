//! Process-local implementation of every storage port.
//!
//! Tree mutations and grant inserts run under a single write lock, so the check-then-write
//! sequences are atomic. Lock order is catalog, then users, then grants.

use std::collections::{HashMap, HashSet};

use castellan_application::{AuditEvent, UserAccount};
use castellan_domain::{
    PermissionDefinition, PermissionId, RevocationMarker, Role, RoleHierarchy, RoleId, UserId,
    UserRoleGrant, UserScope,
};
use tokio::sync::RwLock;

mod catalog;
mod grants;
mod sessions;
mod users;

#[derive(Debug, Default)]
struct RoleCatalog {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, PermissionDefinition>,
    links: HashSet<(RoleId, PermissionId)>,
}

impl RoleCatalog {
    fn hierarchy(&self) -> RoleHierarchy {
        RoleHierarchy::from_roles(self.roles.values())
    }
}

/// In-memory access store used for development and engine tests.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    catalog: RwLock<RoleCatalog>,
    users: RwLock<HashMap<UserId, UserAccount>>,
    grants: RwLock<Vec<UserRoleGrant>>,
    scopes: RwLock<HashMap<UserId, Vec<UserScope>>>,
    markers: RwLock<Vec<RevocationMarker>>,
    audit_events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the audit trail, oldest first.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.read().await.clone()
    }
}
