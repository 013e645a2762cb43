use async_trait::async_trait;
use castellan_core::AppResult;
use castellan_domain::{UserId, UserScope};

/// Repository port for per-user scope restrictions.
#[async_trait]
pub trait UserScopeRepository: Send + Sync {
    /// Lists every stored restriction of a user.
    async fn list_user_scopes(&self, user_id: UserId) -> AppResult<Vec<UserScope>>;

    /// Replaces the restrictions of a user in one write.
    async fn replace_user_scopes(&self, user_id: UserId, scopes: Vec<UserScope>)
    -> AppResult<()>;
}
