use async_trait::async_trait;
use castellan_core::AppResult;
use castellan_domain::{RoleId, UserId, UserRoleGrant};
use chrono::{DateTime, Utc};

/// Repository port for user-role grants. Grants are never physically deleted.
#[async_trait]
pub trait UserRoleRepository: Send + Sync {
    /// Inserts a new active grant.
    ///
    /// Must fail with `ConstraintViolation::DuplicateActiveGrant` when an active grant for the
    /// same user and role exists, atomically with the insert.
    async fn insert_grant(&self, grant: UserRoleGrant) -> AppResult<UserRoleGrant>;

    /// Finds the active grant for a user and role.
    async fn find_active_grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<UserRoleGrant>>;

    /// Persists a transition of a grant that was active when read.
    ///
    /// Compare-and-set on the active status: fails with `ConstraintViolation::NoActiveGrant`
    /// when the stored row is no longer active.
    async fn save_transition(&self, grant: &UserRoleGrant) -> AppResult<UserRoleGrant>;

    /// Lists grants of a user, newest first; `active_only` keeps status `active` rows.
    async fn list_user_grants(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>>;

    /// Marks every active grant with `valid_to <= now` as expired. Returns the count.
    async fn expire_lapsed_grants(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
