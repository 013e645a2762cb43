use std::str::FromStr;

use async_trait::async_trait;
use castellan_application::RevokedTokenRepository;
use castellan_core::{AppError, AppResult};
use castellan_domain::{ALL_SESSIONS_MARKER, RevocationMarker, RevocationReason, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed revocation markers.
#[derive(Clone)]
pub struct PostgresRevokedTokenRepository {
    pool: PgPool,
}

impl PostgresRevokedTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MarkerRow {
    token_id: String,
    user_id: Uuid,
    reason: String,
    revoked_at: DateTime<Utc>,
}

impl MarkerRow {
    fn into_marker(self) -> AppResult<RevocationMarker> {
        let reason = RevocationReason::from_str(&self.reason).map_err(|error| {
            AppError::Internal(format!("stored revocation reason is invalid: {error}"))
        })?;

        Ok(RevocationMarker::from_stored(
            &self.token_id,
            UserId::from_uuid(self.user_id),
            reason,
            self.revoked_at,
        ))
    }
}

#[async_trait]
impl RevokedTokenRepository for PostgresRevokedTokenRepository {
    async fn insert_marker(&self, marker: RevocationMarker) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_id, user_id, reason, revoked_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(marker.stored_token_id())
        .bind(marker.user_id().as_uuid())
        .bind(marker.reason().as_str())
        .bind(marker.revoked_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to store revocation marker: {error}"))
        })?;

        Ok(())
    }

    async fn markers_for_token(
        &self,
        token_id: &str,
        user_id: UserId,
    ) -> AppResult<Vec<RevocationMarker>> {
        let rows = sqlx::query_as::<_, MarkerRow>(
            r#"
            SELECT token_id, user_id, reason, revoked_at
            FROM revoked_tokens
            WHERE token_id = $1
                OR (token_id = $2 AND user_id = $3)
            "#,
        )
        .bind(token_id)
        .bind(ALL_SESSIONS_MARKER)
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load revocation markers: {error}"))
        })?;

        rows.into_iter().map(MarkerRow::into_marker).collect()
    }

    async fn prune_markers(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE revoked_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to prune revocation markers: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}
