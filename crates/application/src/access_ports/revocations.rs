use async_trait::async_trait;
use castellan_core::AppResult;
use castellan_domain::{RevocationMarker, UserId};
use chrono::{DateTime, Utc};

/// Repository port for revocation markers. Markers are insert-only.
#[async_trait]
pub trait RevokedTokenRepository: Send + Sync {
    /// Stores a marker.
    async fn insert_marker(&self, marker: RevocationMarker) -> AppResult<()>;

    /// Returns markers naming `token_id` plus every bulk marker of `user_id`.
    async fn markers_for_token(
        &self,
        token_id: &str,
        user_id: UserId,
    ) -> AppResult<Vec<RevocationMarker>>;

    /// Deletes markers written before `older_than`. Returns the count.
    async fn prune_markers(&self, older_than: DateTime<Utc>) -> AppResult<u64>;
}
