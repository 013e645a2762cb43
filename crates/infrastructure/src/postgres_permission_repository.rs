use async_trait::async_trait;
use castellan_application::PermissionRepository;
use castellan_core::{AppError, AppResult, ConstraintViolation, NonEmptyString};
use castellan_domain::{PermissionCode, PermissionDefinition, PermissionId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed permission catalog.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PermissionRow {
    id: Uuid,
    code: String,
    display_name: String,
    description: Option<String>,
}

impl PermissionRow {
    pub(crate) fn into_definition(self) -> AppResult<PermissionDefinition> {
        let code = PermissionCode::parse(&self.code).map_err(|error| {
            AppError::Internal(format!("stored permission '{}' is invalid: {error}", self.code))
        })?;

        Ok(PermissionDefinition::new(
            PermissionId::from_uuid(self.id),
            code,
            NonEmptyString::new(self.display_name)?,
            self.description,
        ))
    }
}

fn map_code_conflict(error: sqlx::Error, code: PermissionCode) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("permission '{code}' already exists"));
    }

    AppError::Internal(format!("failed to save permission: {error}"))
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, display_name, description
            FROM permissions
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, display_name, description
            FROM permissions
            WHERE id = $1
            "#,
        )
        .bind(permission_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?
        .map(PermissionRow::into_definition)
        .transpose()
    }

    async fn create_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        sqlx::query(
            r#"
            INSERT INTO permissions (id, code, display_name, description, is_system)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.code().to_string())
        .bind(permission.display_name().as_str())
        .bind(permission.description())
        .bind(permission.is_system())
        .execute(&self.pool)
        .await
        .map_err(|error| map_code_conflict(error, permission.code()))?;

        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE permissions
            SET code = $2,
                display_name = $3,
                description = $4,
                is_system = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.code().to_string())
        .bind(permission.display_name().as_str())
        .bind(permission.description())
        .bind(permission.is_system())
        .execute(&self.pool)
        .await
        .map_err(|error| map_code_conflict(error, permission.code()))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "permission '{}' not found",
                permission.id()
            )));
        }

        Ok(permission)
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let exists = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM permissions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(permission_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' not found"
            )));
        }

        let roles = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM role_permissions
            WHERE permission_id = $1
            "#,
        )
        .bind(permission_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count permission references: {error}"))
        })?;
        if roles > 0 {
            return Err(ConstraintViolation::PermissionInUse {
                roles: roles.unsigned_abs(),
            }
            .into());
        }

        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(permission_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete permission: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn ensure_permissions(&self, permissions: Vec<PermissionDefinition>) -> AppResult<u64> {
        let mut inserted = 0;
        for permission in permissions {
            inserted += sqlx::query(
                r#"
                INSERT INTO permissions (id, code, display_name, description, is_system)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(permission.id().as_uuid())
            .bind(permission.code().to_string())
            .bind(permission.display_name().as_str())
            .bind(permission.description())
            .bind(permission.is_system())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to seed permission: {error}"))
            })?
            .rows_affected();
        }

        Ok(inserted)
    }
}
