use async_trait::async_trait;
use castellan_application::{AuditEvent, AuditRepository};
use castellan_core::{AppError, AppResult};
use sqlx::PgPool;

/// Longest detail text kept per entry, in characters.
const MAX_DETAIL_CHARS: usize = 1024;

/// Append-only audit trail in `audit_log_entries`.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn clip_detail(detail: Option<String>) -> Option<String> {
    detail.map(|detail| match detail.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((cut, _)) => detail[..cut].to_owned(),
        None => detail,
    })
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let action = event.action.as_str();
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (subject, action, resource_type, resource_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.subject.as_str())
        .bind(action)
        .bind(event.resource_type.as_str())
        .bind(event.resource_id.as_str())
        .bind(clip_detail(event.detail))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append audit event '{action}': {error}"))
        })?;

        Ok(())
    }
}
