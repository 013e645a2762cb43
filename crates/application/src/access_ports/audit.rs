use async_trait::async_trait;
use castellan_core::AppResult;
use castellan_domain::AuditAction;

/// Immutable audit event emitted by administration use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Username of the actor, or `system` for background jobs.
    pub subject: String,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

/// Port for append-only audit storage.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
