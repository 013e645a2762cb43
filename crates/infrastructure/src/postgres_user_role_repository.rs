use std::str::FromStr;

use async_trait::async_trait;
use castellan_application::UserRoleRepository;
use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{
    AUTO_EXPIRED_REASON, GrantId, GrantPriority, GrantRecord, GrantStatus, RoleId, UserId,
    UserRoleGrant,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const ONE_ACTIVE_GRANT_INDEX: &str = "idx_user_roles_one_active";

const GRANT_COLUMNS: &str = "id, user_id, role_id, valid_from, valid_to, priority, status, \
     assigned_by, assigned_reason, updated_by, revoked_by, revoked_reason, created_at, updated_at";

/// PostgreSQL-backed grant ledger.
#[derive(Clone)]
pub struct PostgresUserRoleRepository {
    pool: PgPool,
}

impl PostgresUserRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    priority: i32,
    status: String,
    assigned_by: Option<Uuid>,
    assigned_reason: Option<String>,
    updated_by: Option<Uuid>,
    revoked_by: Option<Uuid>,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GrantRow {
    fn into_grant(self) -> AppResult<UserRoleGrant> {
        let status = GrantStatus::from_str(&self.status).map_err(|error| {
            AppError::Internal(format!("grant '{}' has an invalid status: {error}", self.id))
        })?;
        let priority = GrantPriority::new(self.priority).map_err(|error| {
            AppError::Internal(format!("grant '{}' has an invalid priority: {error}", self.id))
        })?;

        Ok(UserRoleGrant::from_record(GrantRecord {
            id: GrantId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            role_id: RoleId::from_uuid(self.role_id),
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            priority,
            status,
            assigned_by: self.assigned_by.map(UserId::from_uuid),
            assigned_reason: self.assigned_reason,
            updated_by: self.updated_by.map(UserId::from_uuid),
            revoked_by: self.revoked_by.map(UserId::from_uuid),
            revoked_reason: self.revoked_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }))
    }
}

fn map_insert_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        if database_error.constraint() == Some(ONE_ACTIVE_GRANT_INDEX) {
            return ConstraintViolation::DuplicateActiveGrant.into();
        }
        if database_error.code().as_deref() == Some("23503") {
            return AppError::NotFound("user not found".to_owned());
        }
    }

    AppError::Internal(format!("failed to insert role grant: {error}"))
}

#[async_trait]
impl UserRoleRepository for PostgresUserRoleRepository {
    async fn insert_grant(&self, grant: UserRoleGrant) -> AppResult<UserRoleGrant> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start grant transaction: {error}"))
        })?;

        // Holds off a concurrent role delete until the grant is committed.
        let role_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE id = $1 FOR SHARE")
            .bind(grant.role_id().as_uuid())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
            .is_some();
        if !role_exists {
            return Err(AppError::NotFound(format!(
                "role '{}' not found",
                grant.role_id()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO user_roles (
                id,
                user_id,
                role_id,
                valid_from,
                valid_to,
                priority,
                status,
                assigned_by,
                assigned_reason,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(grant.id().as_uuid())
        .bind(grant.user_id().as_uuid())
        .bind(grant.role_id().as_uuid())
        .bind(grant.valid_from())
        .bind(grant.valid_to())
        .bind(grant.priority().value())
        .bind(grant.status().as_str())
        .bind(grant.assigned_by().map(|user_id| user_id.as_uuid()))
        .bind(grant.assigned_reason())
        .bind(grant.created_at())
        .bind(grant.updated_at())
        .execute(&mut *transaction)
        .await
        .map_err(map_insert_error)?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit role grant: {error}"))
        })?;

        Ok(grant)
    }

    async fn find_active_grant(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<UserRoleGrant>> {
        sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM user_roles \
             WHERE user_id = $1 AND role_id = $2 AND status = 'active'"
        ))
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grant: {error}")))?
        .map(GrantRow::into_grant)
        .transpose()
    }

    async fn save_transition(&self, grant: &UserRoleGrant) -> AppResult<UserRoleGrant> {
        let row = sqlx::query_as::<_, GrantRow>(&format!(
            "UPDATE user_roles \
             SET valid_to = $2, priority = $3, status = $4, assigned_reason = $5, \
                 updated_by = $6, revoked_by = $7, revoked_reason = $8, updated_at = $9 \
             WHERE id = $1 AND status = 'active' \
             RETURNING {GRANT_COLUMNS}"
        ))
        .bind(grant.id().as_uuid())
        .bind(grant.valid_to())
        .bind(grant.priority().value())
        .bind(grant.status().as_str())
        .bind(grant.assigned_reason())
        .bind(grant.updated_by().map(|user_id| user_id.as_uuid()))
        .bind(grant.revoked_by().map(|user_id| user_id.as_uuid()))
        .bind(grant.revoked_reason())
        .bind(grant.updated_at())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update role grant: {error}")))?
        .ok_or(AppError::Constraint(ConstraintViolation::NoActiveGrant))?;

        row.into_grant()
    }

    async fn list_user_grants(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM user_roles \
             WHERE user_id = $1 AND ($2 = false OR status = 'active') \
             ORDER BY priority, created_at"
        ))
        .bind(user_id.as_uuid())
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_grant).collect()
    }

    async fn expire_lapsed_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_roles
            SET status = 'expired',
                revoked_reason = $2,
                updated_at = $1
            WHERE status = 'active'
                AND valid_to IS NOT NULL
                AND valid_to <= $1
            "#,
        )
        .bind(now)
        .bind(AUTO_EXPIRED_REASON)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire role grants: {error}")))?;

        Ok(result.rows_affected())
    }
}
