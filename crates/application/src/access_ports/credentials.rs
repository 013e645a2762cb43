use castellan_core::AppResult;
use castellan_domain::UserId;
use chrono::{DateTime, Utc};

/// Port for password hashing. Keeps the application free of a concrete KDF.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject.
    pub user_id: UserId,
    /// Login name at issue time.
    pub username: String,
    /// Token identifier (JTI).
    pub token_id: String,
    /// Issue time, microsecond precision.
    pub issued_at: DateTime<Utc>,
    /// Expiry time, second precision.
    pub expires_at: DateTime<Utc>,
    /// Highest-precedence role name at issue time.
    pub role: Option<String>,
    /// Effective permissions at issue time.
    pub permissions: Vec<String>,
}

/// A freshly signed token and the claims it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Encoded bearer token.
    pub token: String,
    /// Claims inside the token.
    pub claims: SessionClaims,
}

/// Port for signing and verifying session tokens.
pub trait SessionTokenCodec: Send + Sync {
    /// Signs a new token. The codec picks the JTI and the validity window.
    fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Option<String>,
        permissions: Vec<String>,
    ) -> AppResult<IssuedSession>;

    /// Verifies signature, issuer and expiry, then returns the claims.
    fn decode(&self, token: &str) -> AppResult<SessionClaims>;
}
