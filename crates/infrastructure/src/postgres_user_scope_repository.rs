use async_trait::async_trait;
use castellan_application::UserScopeRepository;
use castellan_core::{AppError, AppResult};
use castellan_domain::{PermissionCode, ScopeConditions, UserId, UserScope};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed storage for per-user scope restrictions.
#[derive(Clone)]
pub struct PostgresUserScopeRepository {
    pool: PgPool,
}

impl PostgresUserScopeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScopeRow {
    id: Uuid,
    user_id: Uuid,
    permission: Option<String>,
    conditions: Value,
}

impl ScopeRow {
    fn into_scope(self) -> AppResult<UserScope> {
        let permission = self
            .permission
            .as_deref()
            .map(PermissionCode::parse)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!("scope '{}' has an invalid permission: {error}", self.id))
            })?;
        let conditions = ScopeConditions::from_json(&self.conditions).map_err(|error| {
            AppError::Internal(format!("scope '{}' has invalid conditions: {error}", self.id))
        })?;

        Ok(UserScope::new(
            self.id,
            UserId::from_uuid(self.user_id),
            permission,
            conditions,
        ))
    }
}

#[async_trait]
impl UserScopeRepository for PostgresUserScopeRepository {
    async fn list_user_scopes(&self, user_id: UserId) -> AppResult<Vec<UserScope>> {
        let rows = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, user_id, permission, conditions
            FROM user_scopes
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list user scopes: {error}")))?;

        rows.into_iter().map(ScopeRow::into_scope).collect()
    }

    async fn replace_user_scopes(&self, user_id: UserId, scopes: Vec<UserScope>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let user_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;
        if user_exists.is_none() {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        sqlx::query("DELETE FROM user_scopes WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clear user scopes: {error}")))?;

        for scope in &scopes {
            sqlx::query(
                r#"
                INSERT INTO user_scopes (id, user_id, permission, conditions)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(scope.id())
            .bind(user_id.as_uuid())
            .bind(scope.permission().map(|permission| permission.to_string()))
            .bind(scope.conditions().to_json())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to store user scope: {error}")))?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }
}
