use std::sync::Arc;

use castellan_core::{AppError, AppResult};
use castellan_domain::AuditAction;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::{AuditEvent, AuditRepository, RoleAssignmentLedger, TokenRevocationRegistry};

/// Subject recorded on events appended by background maintenance.
pub const SYSTEM_SUBJECT: &str = "system";

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Grants moved from active to expired.
    pub expired_grants: u64,
    /// Revocation markers deleted.
    pub pruned_markers: u64,
}

/// Periodic maintenance: grant expiry sweep and revocation marker pruning.
#[derive(Clone)]
pub struct HousekeepingService {
    ledger: RoleAssignmentLedger,
    revocations: TokenRevocationRegistry,
    audit_repository: Arc<dyn AuditRepository>,
    marker_retention: Duration,
}

impl HousekeepingService {
    /// Creates the service. Markers are kept for `marker_retention` or for the session
    /// lifetime, whichever is longer, so a marker never disappears while the token it
    /// denies could still verify.
    #[must_use]
    pub fn new(
        ledger: RoleAssignmentLedger,
        revocations: TokenRevocationRegistry,
        audit_repository: Arc<dyn AuditRepository>,
        marker_retention: Duration,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            ledger,
            revocations,
            audit_repository,
            marker_retention: marker_retention.max(session_lifetime),
        }
    }

    /// Returns the effective marker retention.
    #[must_use]
    pub fn marker_retention(&self) -> Duration {
        self.marker_retention
    }

    /// Expires lapsed grants and records the count when any were closed.
    pub async fn sweep_expired_grants(&self) -> AppResult<u64> {
        let expired = self.ledger.sweep_expired().await?;
        if expired > 0 {
            self.audit_repository
                .append_event(AuditEvent {
                    subject: SYSTEM_SUBJECT.to_owned(),
                    action: AuditAction::RoleGrantsExpired,
                    resource_type: "user_role".to_owned(),
                    resource_id: "*".to_owned(),
                    detail: Some(format!("{expired} grants expired")),
                })
                .await?;
        }

        Ok(expired)
    }

    /// Deletes markers past the retention window relative to `now`.
    pub async fn prune_markers(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now.checked_sub_signed(self.marker_retention).ok_or_else(|| {
            AppError::Validation("marker retention reaches past the supported time range".to_owned())
        })?;
        self.revocations.prune(cutoff).await
    }

    /// Runs both tasks once.
    pub async fn run_once(&self) -> AppResult<HousekeepingReport> {
        let report = HousekeepingReport {
            expired_grants: self.sweep_expired_grants().await?,
            pruned_markers: self.prune_markers(Utc::now()).await?,
        };

        info!(
            expired_grants = report.expired_grants,
            pruned_markers = report.pruned_markers,
            "housekeeping pass finished"
        );

        Ok(report)
    }
}
