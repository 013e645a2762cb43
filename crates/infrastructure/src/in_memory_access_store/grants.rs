use async_trait::async_trait;
use castellan_application::UserRoleRepository;
use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{RoleId, UserId, UserRoleGrant};
use chrono::{DateTime, Utc};

use super::InMemoryAccessStore;

#[async_trait]
impl UserRoleRepository for InMemoryAccessStore {
    async fn insert_grant(&self, grant: UserRoleGrant) -> AppResult<UserRoleGrant> {
        let catalog = self.catalog.read().await;
        if !catalog.roles.contains_key(&grant.role_id()) {
            return Err(AppError::NotFound(format!(
                "role '{}' not found",
                grant.role_id()
            )));
        }

        let mut grants = self.grants.write().await;
        if grants.iter().any(|existing| {
            existing.is_active()
                && existing.user_id() == grant.user_id()
                && existing.role_id() == grant.role_id()
        }) {
            return Err(ConstraintViolation::DuplicateActiveGrant.into());
        }

        grants.push(grant.clone());
        Ok(grant)
    }

    async fn find_active_grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<UserRoleGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .find(|grant| {
                grant.is_active() && grant.user_id() == user_id && grant.role_id() == role_id
            })
            .cloned())
    }

    async fn save_transition(&self, grant: &UserRoleGrant) -> AppResult<UserRoleGrant> {
        let mut grants = self.grants.write().await;
        let Some(stored) = grants
            .iter_mut()
            .find(|stored| stored.id() == grant.id() && stored.is_active())
        else {
            return Err(ConstraintViolation::NoActiveGrant.into());
        };

        *stored = grant.clone();
        Ok(grant.clone())
    }

    async fn list_user_grants(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>> {
        let mut grants: Vec<UserRoleGrant> = self
            .grants
            .read()
            .await
            .iter()
            .filter(|grant| grant.user_id() == user_id && (!active_only || grant.is_active()))
            .cloned()
            .collect();
        grants.sort_by_key(|grant| (grant.priority(), grant.created_at()));
        Ok(grants)
    }

    async fn expire_lapsed_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for grant in self.grants.write().await.iter_mut() {
            if grant.is_active() && grant.has_lapsed_at(now) {
                grant.expire(now)?;
                expired += 1;
            }
        }

        Ok(expired)
    }
}
