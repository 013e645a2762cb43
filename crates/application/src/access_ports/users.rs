use async_trait::async_trait;
use castellan_core::AppResult;
use castellan_domain::{RoleId, UserId};
use uuid::Uuid;

/// User account as read by the engine. Account management lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Canonical email address.
    pub email: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Disabled accounts cannot authenticate.
    pub is_active: bool,
    /// Optional primary role; blocks deletion of that role.
    pub primary_role_id: Option<RoleId>,
    /// Optional department reference.
    pub department_id: Option<Uuid>,
}

/// Port for the user lookups the engine needs.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by identifier.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>>;

    /// Finds a user by login name (case-insensitive).
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserAccount>>;

    /// Creates an account; used by bootstrap seeding. Fails with `Conflict` on a taken username.
    async fn create_user(&self, account: UserAccount) -> AppResult<()>;

    /// Replaces the stored password hash.
    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> AppResult<()>;
}
