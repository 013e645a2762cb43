use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated principal attached to a request after token validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: Uuid,
    username: String,
    token_id: String,
    issued_at: DateTime<Utc>,
}

impl UserIdentity {
    /// Creates a user identity from the validated session claims.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        token_id: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            token_id: token_id.into(),
            issued_at,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the login name of the user.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the identifier (JTI) of the session token that authenticated the request.
    #[must_use]
    pub fn token_id(&self) -> &str {
        self.token_id.as_str()
    }

    /// Returns when the session token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}
