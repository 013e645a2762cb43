//! User account primitives read by the authorization engine.

use castellan_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lower-cased email address with a minimal structural check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validates and normalizes an email address.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_lowercase();

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain '@'".to_owned(),
            ));
        };

        if local.is_empty() || domain.contains('@') {
            return Err(AppError::Validation(
                "email address must have a local part and exactly one '@'".to_owned(),
            ));
        }

        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(AppError::Validation(format!(
                "email domain '{domain}' is not valid"
            )));
        }

        if normalized.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Shortest accepted password.
pub const PASSWORD_MIN_LENGTH: usize = 10;

/// Longest accepted password; bounds Argon2 work per login attempt.
pub const PASSWORD_MAX_LENGTH: usize = 128;

const WEAK_PASSWORDS: &[&str] = &[
    "password123",
    "password1234",
    "1234567890",
    "qwertyuiop",
    "letmein123",
    "welcome123",
    "changeme123",
    "administrator",
];

/// Validates a new plaintext password before it is hashed.
pub fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();

    if length < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    if length > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    let lowered = password.to_lowercase();
    if WEAK_PASSWORDS.iter().any(|weak| *weak == lowered) {
        return Err(AppError::Validation(
            "password is on the list of commonly breached passwords".to_owned(),
        ));
    }

    Ok(())
}
