//! Adjacency snapshot of the role tree.
//!
//! Storage adapters load the `(role, parent)` pairs, build a [`RoleHierarchy`], and run every
//! tree check against it inside the same write transaction that applies the change.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use castellan_core::{AppError, AppResult, ConstraintViolation};

use crate::role::{MAX_ROLE_LEVELS, Role, RoleId};

/// Upper bound on any parent walk; a longer chain can only come from corrupt data.
const TRAVERSAL_LIMIT: usize = 64;

/// In-memory view of parent links.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    parents: HashMap<RoleId, Option<RoleId>>,
    children: HashMap<RoleId, Vec<RoleId>>,
}

impl RoleHierarchy {
    /// Builds a snapshot from `(role, parent)` pairs.
    pub fn from_links(links: impl IntoIterator<Item = (RoleId, Option<RoleId>)>) -> Self {
        let mut hierarchy = Self::default();
        for (role_id, parent_id) in links {
            hierarchy.parents.insert(role_id, parent_id);
            if let Some(parent_id) = parent_id {
                hierarchy.children.entry(parent_id).or_default().push(role_id);
            }
        }

        hierarchy
    }

    /// Builds a snapshot from loaded roles.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        Self::from_links(roles.into_iter().map(|role| (role.id(), role.parent_id())))
    }

    /// Returns whether the role is part of the snapshot.
    #[must_use]
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.parents.contains_key(&role_id)
    }

    /// Returns the number of roles in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns whether the snapshot holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns the direct parent of a role.
    #[must_use]
    pub fn parent_of(&self, role_id: RoleId) -> Option<RoleId> {
        self.parents.get(&role_id).copied().flatten()
    }

    /// Returns the direct children of a role.
    #[must_use]
    pub fn children_of(&self, role_id: RoleId) -> &[RoleId] {
        self.children
            .get(&role_id)
            .map_or(&[] as &[RoleId], Vec::as_slice)
    }

    /// Returns the roles without a parent.
    #[must_use]
    pub fn roots(&self) -> Vec<RoleId> {
        let mut roots: Vec<RoleId> = self
            .parents
            .iter()
            .filter(|(_, parent)| parent.is_none())
            .map(|(role_id, _)| *role_id)
            .collect();
        roots.sort();
        roots
    }

    /// Strict ancestors ordered from the direct parent up to the root.
    pub fn ancestors(&self, role_id: RoleId) -> AppResult<Vec<RoleId>> {
        if !self.contains(role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        let mut chain = Vec::new();
        let mut current = self.parent_of(role_id);
        while let Some(parent_id) = current {
            if parent_id == role_id || chain.contains(&parent_id) || chain.len() >= TRAVERSAL_LIMIT
            {
                return Err(AppError::Internal(format!(
                    "role hierarchy is corrupt: parent chain of '{role_id}' does not terminate"
                )));
            }

            chain.push(parent_id);
            current = self.parent_of(parent_id);
        }

        Ok(chain)
    }

    /// Every role below `role_id`, excluding the role itself.
    #[must_use]
    pub fn descendants(&self, role_id: RoleId) -> BTreeSet<RoleId> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<RoleId> = self.children_of(role_id).iter().copied().collect();

        while let Some(next) = queue.pop_front() {
            if next == role_id || !found.insert(next) {
                continue;
            }
            queue.extend(self.children_of(next).iter().copied());
        }

        found
    }

    /// Level of a role; roots are level 0.
    pub fn level(&self, role_id: RoleId) -> AppResult<usize> {
        self.ancestors(role_id).map(|chain| chain.len())
    }

    /// Number of edges on the longest path from the role down to a leaf.
    #[must_use]
    pub fn subtree_height(&self, role_id: RoleId) -> usize {
        let mut visited = HashSet::from([role_id]);
        let mut stack = vec![(role_id, 0_usize)];
        let mut height = 0;

        while let Some((current, depth)) = stack.pop() {
            height = height.max(depth);
            for child in self.children_of(current) {
                if visited.insert(*child) {
                    stack.push((*child, depth + 1));
                }
            }
        }

        height
    }

    /// Levels for every role in the snapshot.
    pub fn levels(&self) -> AppResult<HashMap<RoleId, usize>> {
        self.parents
            .keys()
            .map(|role_id| self.level(*role_id).map(|level| (*role_id, level)))
            .collect()
    }

    /// Validates placing a new role under `parent_id` and returns the new role's level.
    pub fn check_new_role(&self, parent_id: Option<RoleId>) -> AppResult<usize> {
        let Some(parent_id) = parent_id else {
            return Ok(0);
        };

        if !self.contains(parent_id) {
            return Err(AppError::NotFound(format!(
                "parent role '{parent_id}' not found"
            )));
        }

        let level = self.level(parent_id)? + 1;
        if level >= MAX_ROLE_LEVELS {
            return Err(ConstraintViolation::DepthExceeded {
                max_levels: MAX_ROLE_LEVELS,
            }
            .into());
        }

        Ok(level)
    }

    /// Validates moving `role_id` (with its whole subtree) under `new_parent_id`.
    ///
    /// `None` detaches the role into a root. Returns the role's new level.
    pub fn check_reparent(
        &self,
        role_id: RoleId,
        new_parent_id: Option<RoleId>,
    ) -> AppResult<usize> {
        if !self.contains(role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        let new_level = match new_parent_id {
            None => 0,
            Some(parent_id) if parent_id == role_id => {
                return Err(ConstraintViolation::SelfParent.into());
            }
            Some(parent_id) => {
                if self.descendants(role_id).contains(&parent_id) {
                    return Err(ConstraintViolation::CircularReference.into());
                }
                if !self.contains(parent_id) {
                    return Err(AppError::NotFound(format!(
                        "parent role '{parent_id}' not found"
                    )));
                }
                self.level(parent_id)? + 1
            }
        };

        if new_level + self.subtree_height(role_id) >= MAX_ROLE_LEVELS {
            return Err(ConstraintViolation::DepthExceeded {
                max_levels: MAX_ROLE_LEVELS,
            }
            .into());
        }

        Ok(new_level)
    }
}
