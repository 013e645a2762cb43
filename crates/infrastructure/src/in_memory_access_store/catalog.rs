use async_trait::async_trait;
use castellan_application::{
    PermissionRepository, RoleChanges, RoleDeletionBlockers, RoleRepository,
};
use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{PermissionDefinition, PermissionId, Role, RoleId};
use chrono::{DateTime, Utc};

use super::{InMemoryAccessStore, RoleCatalog};

fn ensure_permissions_exist(
    catalog: &RoleCatalog,
    permission_ids: &[PermissionId],
) -> AppResult<()> {
    match permission_ids
        .iter()
        .find(|permission_id| !catalog.permissions.contains_key(permission_id))
    {
        Some(missing) => Err(AppError::NotFound(format!(
            "permission '{missing}' not found"
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccessStore {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.catalog.read().await.roles.values().cloned().collect();
        roles.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));
        Ok(roles)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.catalog.read().await.roles.get(&role_id).cloned())
    }

    async fn create_role(&self, role: Role, permission_ids: &[PermissionId]) -> AppResult<Role> {
        let mut catalog = self.catalog.write().await;

        if catalog
            .roles
            .values()
            .any(|existing| existing.name() == role.name())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name()
            )));
        }
        catalog.hierarchy().check_new_role(role.parent_id())?;
        ensure_permissions_exist(&catalog, permission_ids)?;

        catalog.links.extend(
            permission_ids
                .iter()
                .map(|permission_id| (role.id(), *permission_id)),
        );
        catalog.roles.insert(role.id(), role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Role> {
        let mut catalog = self.catalog.write().await;
        let hierarchy = catalog.hierarchy();

        let mut role = catalog
            .roles
            .get(&role_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;
        if let Some(name) = &changes.name
            && catalog
                .roles
                .values()
                .any(|existing| existing.id() != role_id && existing.name() == name)
        {
            return Err(AppError::Conflict(format!("role '{name}' already exists")));
        }
        changes.apply_to(&mut role, &hierarchy, now)?;

        if let Some(permission_ids) = &changes.permission_ids {
            ensure_permissions_exist(&catalog, permission_ids)?;
            catalog.links.retain(|(linked_role, _)| *linked_role != role_id);
            catalog.links.extend(
                permission_ids
                    .iter()
                    .map(|permission_id| (role_id, *permission_id)),
            );
        }

        catalog.roles.insert(role_id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut catalog = self.catalog.write().await;
        if !catalog.roles.contains_key(&role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        let users = self.users.read().await;
        let grants = self.grants.read().await;
        RoleDeletionBlockers {
            children: catalog
                .roles
                .values()
                .filter(|role| role.parent_id() == Some(role_id))
                .count() as u64,
            primary_users: users
                .values()
                .filter(|user| user.primary_role_id == Some(role_id))
                .count() as u64,
            active_grants: grants
                .iter()
                .filter(|grant| grant.role_id() == role_id && grant.is_active())
                .count() as u64,
        }
        .check()?;

        catalog.roles.remove(&role_id);
        catalog.links.retain(|(linked_role, _)| *linked_role != role_id);
        Ok(())
    }

    async fn list_role_permissions(
        &self,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionDefinition>> {
        let catalog = self.catalog.read().await;
        let mut permissions: Vec<PermissionDefinition> = catalog
            .links
            .iter()
            .filter(|(linked_role, _)| *linked_role == role_id)
            .filter_map(|(_, permission_id)| catalog.permissions.get(permission_id).cloned())
            .collect();
        permissions.sort_by_key(|permission| permission.code().to_string());
        Ok(permissions)
    }
}

#[async_trait]
impl PermissionRepository for InMemoryAccessStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let mut permissions: Vec<PermissionDefinition> = self
            .catalog
            .read()
            .await
            .permissions
            .values()
            .cloned()
            .collect();
        permissions.sort_by_key(|permission| permission.code().to_string());
        Ok(permissions)
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .catalog
            .read()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn create_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let mut catalog = self.catalog.write().await;
        if catalog
            .permissions
            .values()
            .any(|existing| existing.code() == permission.code())
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.code()
            )));
        }

        catalog
            .permissions
            .insert(permission.id(), permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let mut catalog = self.catalog.write().await;
        if !catalog.permissions.contains_key(&permission.id()) {
            return Err(AppError::NotFound(format!(
                "permission '{}' not found",
                permission.id()
            )));
        }
        if catalog
            .permissions
            .values()
            .any(|existing| existing.id() != permission.id() && existing.code() == permission.code())
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.code()
            )));
        }

        catalog
            .permissions
            .insert(permission.id(), permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let mut catalog = self.catalog.write().await;
        if !catalog.permissions.contains_key(&permission_id) {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' not found"
            )));
        }

        let roles = catalog
            .links
            .iter()
            .filter(|(_, linked)| *linked == permission_id)
            .count() as u64;
        if roles > 0 {
            return Err(ConstraintViolation::PermissionInUse { roles }.into());
        }

        catalog.permissions.remove(&permission_id);
        Ok(())
    }

    async fn ensure_permissions(&self, permissions: Vec<PermissionDefinition>) -> AppResult<u64> {
        let mut catalog = self.catalog.write().await;
        let mut inserted = 0;
        for permission in permissions {
            if catalog
                .permissions
                .values()
                .all(|existing| existing.code() != permission.code())
            {
                catalog.permissions.insert(permission.id(), permission);
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}
