use std::collections::{BTreeSet, HashSet};

use castellan_core::AppResult;
use castellan_domain::{Role, RoleId, UserId, UserRoleGrant, any_grants};
use tracing::debug;

use crate::role_graph_service::RoleSnapshot;
use crate::{PermissionCatalogService, RoleAssignmentLedger, RoleGraphService};

/// Where an effective permission comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSource {
    /// Granted to the role itself.
    Direct {
        /// Role holding the permission.
        role_id: RoleId,
        /// Name of that role.
        role_name: String,
    },
    /// Granted to a strict ancestor.
    Inherited {
        /// Ancestor holding the permission.
        role_id: RoleId,
        /// Name of that ancestor.
        role_name: String,
    },
    /// Granted by the legacy base matrix for a role name.
    Legacy {
        /// Role name the matrix entry is keyed by.
        role_name: String,
    },
}

/// An effective permission with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPermission {
    /// Permission string.
    pub permission: String,
    /// Provenance.
    pub source: PermissionSource,
}

/// Everything a user may do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermissions {
    /// User the set was computed for.
    pub user_id: UserId,
    /// Grants in force, ordered by precedence.
    pub grants: Vec<UserRoleGrant>,
    /// Roles behind those grants, in the same order.
    pub roles: Vec<Role>,
    /// Distinct permission strings.
    pub permissions: BTreeSet<String>,
    /// Permissions with provenance; first source wins.
    pub details: Vec<ResolvedPermission>,
}

impl EffectivePermissions {
    /// Returns whether the set covers `required`.
    #[must_use]
    pub fn allows(&self, required: &str) -> bool {
        any_grants(self.permissions.iter().map(String::as_str), required)
    }

    /// Name of the highest-precedence role, if any grant is in force.
    #[must_use]
    pub fn primary_role_name(&self) -> Option<&str> {
        self.roles.first().map(|role| role.name().as_str())
    }
}

/// Computes effective permissions for roles and users.
#[derive(Clone)]
pub struct PermissionResolver {
    roles: RoleGraphService,
    ledger: RoleAssignmentLedger,
    catalog: PermissionCatalogService,
}

impl PermissionResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(
        roles: RoleGraphService,
        ledger: RoleAssignmentLedger,
        catalog: PermissionCatalogService,
    ) -> Self {
        Self {
            roles,
            ledger,
            catalog,
        }
    }

    /// Direct permissions plus those of every strict ancestor. Direct wins on equal strings.
    pub async fn role_permissions(&self, role_id: RoleId) -> AppResult<Vec<ResolvedPermission>> {
        let snapshot = self.roles.snapshot().await?;
        snapshot.role(role_id)?;
        self.resolve_role(&snapshot, role_id).await
    }

    /// Union over the user's grants in force plus the legacy matrix entries of those roles.
    pub async fn user_permissions(&self, user_id: UserId) -> AppResult<EffectivePermissions> {
        let grants = self.ledger.active_roles(user_id).await?;
        let snapshot = self.roles.snapshot().await?;

        let mut roles = Vec::with_capacity(grants.len());
        let mut details: Vec<ResolvedPermission> = Vec::new();
        let mut seen = HashSet::new();

        for grant in &grants {
            let Ok(role) = snapshot.role(grant.role_id()) else {
                debug!(role_id = %grant.role_id(), "grant references a missing role");
                continue;
            };
            roles.push(role.clone());

            for resolved in self.resolve_role(&snapshot, role.id()).await? {
                if seen.insert(resolved.permission.clone()) {
                    details.push(resolved);
                }
            }

            for code in self.catalog.legacy_matrix().permissions_for(role.display_name().as_str()) {
                let permission = code.to_string();
                if seen.insert(permission.clone()) {
                    details.push(ResolvedPermission {
                        permission,
                        source: PermissionSource::Legacy {
                            role_name: role.name().to_string(),
                        },
                    });
                }
            }
        }

        debug!(
            user_id = %user_id,
            roles = roles.len(),
            permissions = details.len(),
            "resolved effective permissions"
        );

        Ok(EffectivePermissions {
            user_id,
            grants,
            roles,
            permissions: details
                .iter()
                .map(|resolved| resolved.permission.clone())
                .collect(),
            details,
        })
    }

    /// Checks `required` against the user's effective set.
    pub async fn has_permission(&self, user_id: UserId, required: &str) -> AppResult<bool> {
        Ok(self.user_permissions(user_id).await?.allows(required))
    }

    async fn resolve_role(
        &self,
        snapshot: &RoleSnapshot,
        role_id: RoleId,
    ) -> AppResult<Vec<ResolvedPermission>> {
        let chain = std::iter::once(role_id).chain(snapshot.hierarchy.ancestors(role_id)?);

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for source_id in chain {
            let source_role = snapshot.role(source_id)?;
            let role_name = source_role.name().to_string();
            for permission in self.roles.repository().list_role_permissions(source_id).await? {
                let permission = permission.code().to_string();
                if !seen.insert(permission.clone()) {
                    continue;
                }

                let source = if source_id == role_id {
                    PermissionSource::Direct {
                        role_id: source_id,
                        role_name: role_name.clone(),
                    }
                } else {
                    PermissionSource::Inherited {
                        role_id: source_id,
                        role_name: role_name.clone(),
                    }
                };
                resolved.push(ResolvedPermission { permission, source });
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests;
