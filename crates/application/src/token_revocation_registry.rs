use std::sync::Arc;

use castellan_core::AppResult;
use castellan_domain::{RevocationMarker, RevocationReason, UserId, is_token_valid};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::RevokedTokenRepository;

/// Revoked session tokens and bulk "revoke everything before now" markers.
#[derive(Clone)]
pub struct TokenRevocationRegistry {
    markers: Arc<dyn RevokedTokenRepository>,
}

impl TokenRevocationRegistry {
    /// Creates the registry.
    #[must_use]
    pub fn new(markers: Arc<dyn RevokedTokenRepository>) -> Self {
        Self { markers }
    }

    /// Revokes one token.
    pub async fn revoke(
        &self,
        token_id: &str,
        user_id: UserId,
        reason: RevocationReason,
    ) -> AppResult<()> {
        self.markers
            .insert_marker(RevocationMarker::token(token_id, user_id, reason, Utc::now()))
            .await?;
        info!(user_id = %user_id, reason = reason.as_str(), "session token revoked");
        Ok(())
    }

    /// Revokes every token of the user issued up to now.
    pub async fn revoke_all(&self, user_id: UserId, reason: RevocationReason) -> AppResult<()> {
        self.markers
            .insert_marker(RevocationMarker::all_sessions(user_id, reason, Utc::now()))
            .await?;
        info!(user_id = %user_id, reason = reason.as_str(), "all sessions revoked");
        Ok(())
    }

    /// Returns whether the token is neither individually nor bulk revoked.
    ///
    /// A storage failure counts as revoked.
    pub async fn is_valid(&self, token_id: &str, user_id: UserId, issued_at: DateTime<Utc>) -> bool {
        match self.markers.markers_for_token(token_id, user_id).await {
            Ok(markers) => is_token_valid(&markers, token_id, user_id, issued_at),
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "revocation lookup failed; rejecting token");
                false
            }
        }
    }

    /// Deletes markers written before `older_than`.
    pub async fn prune(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let pruned = self.markers.prune_markers(older_than).await?;
        if pruned > 0 {
            info!(pruned, "pruned revocation markers");
        }
        Ok(pruned)
    }
}
