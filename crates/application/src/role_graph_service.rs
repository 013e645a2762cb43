use std::collections::HashMap;
use std::sync::Arc;

use castellan_core::{AppError, AppResult};
use castellan_domain::{PermissionDefinition, Role, RoleHierarchy, RoleId};
use chrono::Utc;
use tracing::info;

use crate::{CreateRoleInput, RoleChanges, RoleRepository};

/// A role with its level and children, as returned by [`RoleGraphService::role_hierarchy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTreeNode {
    /// The role.
    pub role: Role,
    /// Distance from the root; roots are 0.
    pub level: usize,
    /// Child roles ordered by name.
    pub children: Vec<RoleTreeNode>,
}

/// Roles and their loaded tree.
pub(crate) struct RoleSnapshot {
    pub(crate) roles: HashMap<RoleId, Role>,
    pub(crate) hierarchy: RoleHierarchy,
}

impl RoleSnapshot {
    pub(crate) fn role(&self, role_id: RoleId) -> AppResult<&Role> {
        self.roles
            .get(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))
    }
}

/// Maintains the role tree.
#[derive(Clone)]
pub struct RoleGraphService {
    roles: Arc<dyn RoleRepository>,
}

impl RoleGraphService {
    /// Creates the service.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    /// Lists every role.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.roles.list_roles().await
    }

    /// Returns one role or `NotFound`.
    pub async fn find_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))
    }

    /// Creates a role under an optional parent.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let role = Role::new(
            RoleId::new(),
            input.name,
            input.display_name,
            input.description,
            input.parent_id,
            Utc::now(),
        )?;

        let role = self.roles.create_role(role, &input.permission_ids).await?;
        info!(
            role_id = %role.id(),
            role_name = %role.name(),
            parent_id = ?role.parent_id().map(|id| id.to_string()),
            "role created"
        );

        Ok(role)
    }

    /// Renames, relabels, moves or replaces the permissions of a role.
    pub async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<Role> {
        let moved = changes.moves_role();
        let role = self.roles.update_role(role_id, changes, Utc::now()).await?;
        info!(role_id = %role_id, moved, "role updated");
        Ok(role)
    }

    /// Moves a role with its subtree; `None` makes it a root.
    pub async fn reparent(&self, role_id: RoleId, new_parent_id: Option<RoleId>) -> AppResult<Role> {
        self.update_role(
            role_id,
            RoleChanges {
                parent_id: Some(new_parent_id),
                ..RoleChanges::default()
            },
        )
        .await
    }

    /// Deletes a role without children, primary users or active grants.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        self.roles.delete_role(role_id).await?;
        info!(role_id = %role_id, "role deleted");
        Ok(())
    }

    /// Strict ancestors from the direct parent up to the root.
    pub async fn ancestors(&self, role_id: RoleId) -> AppResult<Vec<Role>> {
        let snapshot = self.snapshot().await?;
        snapshot
            .hierarchy
            .ancestors(role_id)?
            .into_iter()
            .map(|ancestor| snapshot.role(ancestor).cloned())
            .collect()
    }

    /// Every role below `role_id`.
    pub async fn descendants(&self, role_id: RoleId) -> AppResult<Vec<Role>> {
        let snapshot = self.snapshot().await?;
        snapshot.role(role_id)?;
        snapshot
            .hierarchy
            .descendants(role_id)
            .into_iter()
            .map(|descendant| snapshot.role(descendant).cloned())
            .collect()
    }

    /// The forest of roles with their levels.
    pub async fn role_hierarchy(&self) -> AppResult<Vec<RoleTreeNode>> {
        let snapshot = self.snapshot().await?;
        let levels = snapshot.hierarchy.levels()?;

        let mut roots: Vec<&Role> = snapshot
            .hierarchy
            .roots()
            .into_iter()
            .filter_map(|role_id| snapshot.roles.get(&role_id))
            .collect();
        roots.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));

        Ok(roots
            .into_iter()
            .map(|role| build_node(role, &snapshot, &levels))
            .collect())
    }

    /// Permissions granted directly to a role.
    pub async fn direct_permissions(&self, role_id: RoleId) -> AppResult<Vec<PermissionDefinition>> {
        self.find_role(role_id).await?;
        self.roles.list_role_permissions(role_id).await
    }

    pub(crate) async fn snapshot(&self) -> AppResult<RoleSnapshot> {
        let roles = self.roles.list_roles().await?;
        let hierarchy = RoleHierarchy::from_roles(&roles);
        Ok(RoleSnapshot {
            roles: roles.into_iter().map(|role| (role.id(), role)).collect(),
            hierarchy,
        })
    }

    pub(crate) fn repository(&self) -> &Arc<dyn RoleRepository> {
        &self.roles
    }
}

fn build_node(
    role: &Role,
    snapshot: &RoleSnapshot,
    levels: &HashMap<RoleId, usize>,
) -> RoleTreeNode {
    let mut children: Vec<&Role> = snapshot
        .hierarchy
        .children_of(role.id())
        .iter()
        .filter_map(|child_id| snapshot.roles.get(child_id))
        .collect();
    children.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));

    RoleTreeNode {
        role: role.clone(),
        level: levels.get(&role.id()).copied().unwrap_or_default(),
        children: children
            .into_iter()
            .map(|child| build_node(child, snapshot, levels))
            .collect(),
    }
}
