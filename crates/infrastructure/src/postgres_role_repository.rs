//! PostgreSQL-backed role tree.
//!
//! Tree mutations lock every role row before reading the hierarchy, so concurrent moves and
//! deletes serialize on the same snapshot.

use async_trait::async_trait;
use castellan_application::{RoleChanges, RoleDeletionBlockers, RoleRepository};
use castellan_core::{AppError, AppResult, NonEmptyString};
use castellan_domain::{PermissionDefinition, PermissionId, Role, RoleHierarchy, RoleId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::postgres_permission_repository::PermissionRow;

/// PostgreSQL-backed repository for roles and their direct permissions.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self) -> AppResult<Role> {
        Ok(Role::new(
            RoleId::from_uuid(self.id),
            NonEmptyString::new(self.name)?,
            NonEmptyString::new(self.display_name)?,
            self.description,
            self.parent_id.map(RoleId::from_uuid),
            self.created_at,
        )?
        .with_updated_at(self.updated_at))
    }
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'_, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

async fn lock_hierarchy(transaction: &mut Transaction<'_, Postgres>) -> AppResult<RoleHierarchy> {
    let links = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        r#"
        SELECT id, parent_id
        FROM roles
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock role hierarchy: {error}")))?;

    Ok(RoleHierarchy::from_links(links.into_iter().map(
        |(role_id, parent_id)| (RoleId::from_uuid(role_id), parent_id.map(RoleId::from_uuid)),
    )))
}

async fn replace_permissions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> AppResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id.as_uuid())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to clear role permissions: {error}"))
        })?;

    for permission_id in permission_ids {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&mut **transaction)
        .await
        .map_err(|error| map_permission_link_error(error, *permission_id))?;
    }

    Ok(())
}

fn map_permission_link_error(error: sqlx::Error, permission_id: PermissionId) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound(format!("permission '{permission_id}' not found"));
    }

    AppError::Internal(format!("failed to persist role permissions: {error}"))
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to save role: {error}"))
}

async fn count(
    transaction: &mut Transaction<'_, Postgres>,
    statement: &str,
    role_id: RoleId,
) -> AppResult<u64> {
    let count = sqlx::query_scalar::<_, i64>(statement)
        .bind(role_id.as_uuid())
        .fetch_one(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count role references: {error}")))?;

    Ok(count.unsigned_abs())
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, display_name, description, parent_id, created_at, updated_at
            FROM roles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, display_name, description, parent_id, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?
        .map(RoleRow::into_role)
        .transpose()
    }

    async fn create_role(&self, role: Role, permission_ids: &[PermissionId]) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        lock_hierarchy(&mut transaction)
            .await?
            .check_new_role(role.parent_id())?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, description, parent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(role.parent_id().map(|parent_id| parent_id.as_uuid()))
        .bind(role.created_at())
        .bind(role.updated_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.name().as_str()))?;

        replace_permissions(&mut transaction, role.id(), permission_ids).await?;
        commit(transaction).await?;

        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        let hierarchy = lock_hierarchy(&mut transaction).await?;

        let mut role = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, display_name, description, parent_id, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?
        .into_role()?;

        changes.apply_to(&mut role, &hierarchy, now)?;

        sqlx::query(
            r#"
            UPDATE roles
            SET name = $2,
                display_name = $3,
                description = $4,
                parent_id = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(role.name().as_str())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(role.parent_id().map(|parent_id| parent_id.as_uuid()))
        .bind(role.updated_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.name().as_str()))?;

        if let Some(permission_ids) = &changes.permission_ids {
            replace_permissions(&mut transaction, role_id, permission_ids).await?;
        }
        commit(transaction).await?;

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        let hierarchy = lock_hierarchy(&mut transaction).await?;
        if !hierarchy.contains(role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        RoleDeletionBlockers {
            children: hierarchy.children_of(role_id).len() as u64,
            primary_users: count(
                &mut transaction,
                "SELECT COUNT(*) FROM users WHERE primary_role_id = $1",
                role_id,
            )
            .await?,
            active_grants: count(
                &mut transaction,
                "SELECT COUNT(*) FROM user_roles WHERE role_id = $1 AND status = 'active'",
                role_id,
            )
            .await?,
        }
        .check()?;

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        commit(transaction).await
    }

    async fn list_role_permissions(
        &self,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT permissions.id, permissions.code, permissions.display_name, permissions.description
            FROM role_permissions
            INNER JOIN permissions
                ON permissions.id = role_permissions.permission_id
            WHERE role_permissions.role_id = $1
            ORDER BY permissions.code
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list role permissions: {error}"))
        })?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }
}

#[cfg(test)]
mod tests;
