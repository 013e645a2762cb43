use async_trait::async_trait;
use castellan_application::{AuditEvent, AuditRepository, RevokedTokenRepository};
use castellan_core::AppResult;
use castellan_domain::{ALL_SESSIONS_MARKER, RevocationMarker, UserId};
use chrono::{DateTime, Utc};

use super::InMemoryAccessStore;

#[async_trait]
impl RevokedTokenRepository for InMemoryAccessStore {
    async fn insert_marker(&self, marker: RevocationMarker) -> AppResult<()> {
        self.markers.write().await.push(marker);
        Ok(())
    }

    async fn markers_for_token(
        &self,
        token_id: &str,
        user_id: UserId,
    ) -> AppResult<Vec<RevocationMarker>> {
        Ok(self
            .markers
            .read()
            .await
            .iter()
            .filter(|marker| match marker.stored_token_id() {
                ALL_SESSIONS_MARKER => marker.user_id() == user_id,
                stored => stored == token_id,
            })
            .cloned()
            .collect())
    }

    async fn prune_markers(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let mut markers = self.markers.write().await;
        let before = markers.len();
        markers.retain(|marker| marker.revoked_at() >= older_than);
        Ok((before - markers.len()) as u64)
    }
}

#[async_trait]
impl AuditRepository for InMemoryAccessStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.audit_events.write().await.push(event);
        Ok(())
    }
}
