use async_trait::async_trait;
use castellan_application::{UserAccount, UserDirectory};
use castellan_core::{AppError, AppResult};
use castellan_domain::{RoleId, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed user directory.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    primary_role_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            primary_role_id: row.primary_role_id.map(RoleId::from_uuid),
            department_id: row.department_id,
        }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserRepository {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, is_active, primary_role_id, department_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;

        Ok(row.map(UserAccount::from))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, is_active, primary_role_id, department_id
            FROM users
            WHERE lower(username) = lower($1)
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user: {error}")))?;

        Ok(row.map(UserAccount::from))
    }

    async fn create_user(&self, account: UserAccount) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                username,
                email,
                password_hash,
                is_active,
                primary_role_id,
                department_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.username.as_str())
        .bind(account.email.as_str())
        .bind(account.password_hash.as_str())
        .bind(account.is_active)
        .bind(account.primary_role_id.map(|role_id| role_id.as_uuid()))
        .bind(account.department_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return AppError::Conflict(format!(
                    "username '{}' is already taken",
                    account.username
                ));
            }

            AppError::Internal(format!("failed to create user: {error}"))
        })?;

        Ok(())
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update password: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        Ok(())
    }
}
