use std::str::FromStr;

use castellan_core::AppError;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Stored token id of a marker that covers every session of a user.
pub const ALL_SESSIONS_MARKER: &str = "*";

/// Why a session was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// The user signed out.
    Logout,
    /// The user changed their password.
    PasswordChange,
    /// An administrator terminated the user's sessions.
    SessionTerminated,
    /// Any other administrative revocation.
    Administrative,
}

impl RevocationReason {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::PasswordChange => "password_change",
            Self::SessionTerminated => "session_terminated",
            Self::Administrative => "administrative",
        }
    }
}

impl FromStr for RevocationReason {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "logout" => Ok(Self::Logout),
            "password_change" => Ok(Self::PasswordChange),
            "session_terminated" => Ok(Self::SessionTerminated),
            "administrative" => Ok(Self::Administrative),
            _ => Err(AppError::Validation(format!(
                "unknown revocation reason '{value}'"
            ))),
        }
    }
}

/// What a marker revokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "token_id", rename_all = "snake_case")]
pub enum RevocationTarget {
    /// One token, by JTI.
    Token(String),
    /// Every token of the user issued at or before the marker.
    AllSessions,
}

/// An immutable revocation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationMarker {
    user_id: UserId,
    target: RevocationTarget,
    reason: RevocationReason,
    revoked_at: DateTime<Utc>,
}

impl RevocationMarker {
    /// Revokes a single token.
    #[must_use]
    pub fn token(
        token_id: impl Into<String>,
        user_id: UserId,
        reason: RevocationReason,
        revoked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            target: RevocationTarget::Token(token_id.into()),
            reason,
            revoked_at,
        }
    }

    /// Revokes every session of a user issued at or before `revoked_at`.
    ///
    /// The timestamp is truncated to microseconds, the precision of stored markers and of
    /// session token issue times.
    #[must_use]
    pub fn all_sessions(user_id: UserId, reason: RevocationReason, revoked_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            target: RevocationTarget::AllSessions,
            reason,
            revoked_at: revoked_at.trunc_subsecs(6),
        }
    }

    /// Restores a stored marker from its token id column.
    #[must_use]
    pub fn from_stored(
        token_id: &str,
        user_id: UserId,
        reason: RevocationReason,
        revoked_at: DateTime<Utc>,
    ) -> Self {
        if token_id == ALL_SESSIONS_MARKER {
            Self::all_sessions(user_id, reason, revoked_at)
        } else {
            Self::token(token_id, user_id, reason, revoked_at)
        }
    }

    /// Returns the affected user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the revoked target.
    #[must_use]
    pub fn target(&self) -> &RevocationTarget {
        &self.target
    }

    /// Returns the reason.
    #[must_use]
    pub fn reason(&self) -> RevocationReason {
        self.reason
    }

    /// Returns when the marker was written.
    #[must_use]
    pub fn revoked_at(&self) -> DateTime<Utc> {
        self.revoked_at
    }

    /// Value stored in the `token_id` column.
    #[must_use]
    pub fn stored_token_id(&self) -> &str {
        match &self.target {
            RevocationTarget::Token(token_id) => token_id.as_str(),
            RevocationTarget::AllSessions => ALL_SESSIONS_MARKER,
        }
    }

    /// Returns whether this marker invalidates the given token.
    ///
    /// A bulk marker covers tokens issued at or before `revoked_at`, compared at microsecond
    /// precision. A token issued after the marker stays valid even within the same second.
    #[must_use]
    pub fn invalidates(&self, token_id: &str, user_id: UserId, issued_at: DateTime<Utc>) -> bool {
        match &self.target {
            RevocationTarget::Token(revoked) => revoked == token_id,
            RevocationTarget::AllSessions => {
                self.user_id == user_id && self.revoked_at >= issued_at.trunc_subsecs(6)
            }
        }
    }
}

/// Returns whether none of `markers` invalidates the token.
#[must_use]
pub fn is_token_valid(
    markers: &[RevocationMarker],
    token_id: &str,
    user_id: UserId,
    issued_at: DateTime<Utc>,
) -> bool {
    !markers
        .iter()
        .any(|marker| marker.invalidates(token_id, user_id, issued_at))
}
