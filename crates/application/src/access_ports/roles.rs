use async_trait::async_trait;
use castellan_core::{AppResult, ConstraintViolation, NonEmptyString};
use castellan_domain::{PermissionDefinition, PermissionId, Role, RoleHierarchy, RoleId};
use chrono::{DateTime, Utc};

/// Input payload for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: NonEmptyString,
    /// Display name.
    pub display_name: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
    /// Optional parent role.
    pub parent_id: Option<RoleId>,
    /// Direct permissions to attach.
    pub permission_ids: Vec<PermissionId>,
}

/// Partial update of a role. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    /// New unique name.
    pub name: Option<NonEmptyString>,
    /// New display name.
    pub display_name: Option<NonEmptyString>,
    /// New description; a blank value clears it.
    pub description: Option<String>,
    /// New parent; `Some(None)` detaches the role into a root.
    pub parent_id: Option<Option<RoleId>>,
    /// Replacement direct permission set.
    pub permission_ids: Option<Vec<PermissionId>>,
}

impl RoleChanges {
    /// Returns whether the update moves the role.
    #[must_use]
    pub fn moves_role(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Applies the entity-level changes after validating a move against `hierarchy`.
    ///
    /// Name uniqueness and the permission set are left to the storage adapter.
    pub fn apply_to(
        &self,
        role: &mut Role,
        hierarchy: &RoleHierarchy,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(parent_id) = self.parent_id {
            hierarchy.check_reparent(role.id(), parent_id)?;
            role.move_under(parent_id, now)?;
        }
        if let Some(name) = &self.name {
            role.rename(name.clone(), now)?;
        }
        if let Some(display_name) = &self.display_name {
            role.relabel(display_name.clone(), now);
        }
        if let Some(description) = &self.description {
            role.describe(Some(description.clone()), now);
        }

        Ok(())
    }
}

/// References that block deleting a role, counted inside the delete transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleDeletionBlockers {
    /// Direct child roles.
    pub children: u64,
    /// Users with the role as primary role.
    pub primary_users: u64,
    /// Active grants of the role.
    pub active_grants: u64,
}

impl RoleDeletionBlockers {
    /// Fails with the first blocking reference, checked in a fixed order.
    pub fn check(&self) -> AppResult<()> {
        if self.children > 0 {
            return Err(ConstraintViolation::HasChildren.into());
        }
        if self.primary_users > 0 {
            return Err(ConstraintViolation::InUseAsPrimary {
                users: self.primary_users,
            }
            .into());
        }
        if self.active_grants > 0 {
            return Err(ConstraintViolation::InUseAsGrant {
                grants: self.active_grants,
            }
            .into());
        }

        Ok(())
    }
}

/// Repository port for the role tree.
///
/// Mutating methods re-read the hierarchy under a write lock and run the `RoleHierarchy`
/// checks before committing.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists every role.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Finds one role.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Inserts a role and its direct permissions.
    ///
    /// Fails with `Conflict` on a taken name, `NotFound` for a missing parent or permission, and
    /// `DepthExceeded` when the parent is already at the deepest level.
    async fn create_role(&self, role: Role, permission_ids: &[PermissionId]) -> AppResult<Role>;

    /// Applies [`RoleChanges`] atomically.
    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Role>;

    /// Deletes a role after [`RoleDeletionBlockers::check`] passes.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Lists the permissions granted directly to a role.
    async fn list_role_permissions(&self, role_id: RoleId)
    -> AppResult<Vec<PermissionDefinition>>;
}

#[cfg(test)]
mod tests {
    use castellan_core::ConstraintViolation;

    use super::RoleDeletionBlockers;

    #[test]
    fn children_are_reported_before_other_references() {
        let blockers = RoleDeletionBlockers {
            children: 1,
            primary_users: 2,
            active_grants: 3,
        };
        assert_eq!(
            blockers.check().err().and_then(|error| error.constraint().cloned()),
            Some(ConstraintViolation::HasChildren)
        );

        let blockers = RoleDeletionBlockers {
            children: 0,
            ..blockers
        };
        assert_eq!(
            blockers.check().err().and_then(|error| error.constraint().cloned()),
            Some(ConstraintViolation::InUseAsPrimary { users: 2 })
        );
        assert!(RoleDeletionBlockers::default().check().is_ok());
    }
}
