use async_trait::async_trait;
use castellan_application::{UserAccount, UserDirectory, UserScopeRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{UserId, UserScope};

use super::InMemoryAccessStore;

#[async_trait]
impl UserDirectory for InMemoryAccessStore {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create_user(&self, account: UserAccount) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|user| user.username.eq_ignore_ascii_case(&account.username))
        {
            return Err(AppError::Conflict(format!(
                "username '{}' is already taken",
                account.username
            )));
        }

        users.insert(account.id, account);
        Ok(())
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.password_hash = password_hash.to_owned();
        Ok(())
    }
}

#[async_trait]
impl UserScopeRepository for InMemoryAccessStore {
    async fn list_user_scopes(&self, user_id: UserId) -> AppResult<Vec<UserScope>> {
        Ok(self
            .scopes
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_user_scopes(&self, user_id: UserId, scopes: Vec<UserScope>) -> AppResult<()> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        let mut stored = self.scopes.write().await;
        if scopes.is_empty() {
            stored.remove(&user_id);
        } else {
            stored.insert(user_id, scopes);
        }
        Ok(())
    }
}
