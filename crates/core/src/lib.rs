//! Shared primitives for all Rust crates in Castellan.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::UserIdentity;

/// Result type used across Castellan crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string, trimming surrounding whitespace.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Domain invariants that reject a write before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    /// A role was asked to become its own parent.
    #[error("a role cannot be its own parent")]
    SelfParent,

    /// The requested parent lives inside the role's own subtree.
    #[error("the requested parent is a descendant of the role")]
    CircularReference,

    /// The role tree would grow deeper than allowed.
    #[error("role hierarchy depth would exceed {max_levels} levels")]
    DepthExceeded {
        /// Maximum number of levels in the tree.
        max_levels: usize,
    },

    /// The role still has child roles.
    #[error("role still has child roles")]
    HasChildren,

    /// The role is the primary role of at least one user.
    #[error("role is the primary role of {users} user(s)")]
    InUseAsPrimary {
        /// Number of users pointing at the role.
        users: u64,
    },

    /// The role still has active grants.
    #[error("role has {grants} active grant(s)")]
    InUseAsGrant {
        /// Number of active grants referencing the role.
        grants: u64,
    },

    /// An active grant already exists for the user and role.
    #[error("an active grant already exists for this user and role")]
    DuplicateActiveGrant,

    /// No active grant exists for the user and role.
    #[error("no active grant exists for this user and role")]
    NoActiveGrant,

    /// The permission is system-reserved and cannot be mutated.
    #[error("permission '{0}' is system-reserved")]
    SystemReserved(String),

    /// The permission is still referenced by at least one role.
    #[error("permission is referenced by {roles} role(s)")]
    PermissionInUse {
        /// Number of roles holding the permission.
        roles: u64,
    },
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Write rejected by a domain invariant.
    #[error("constraint violation: {0}")]
    Constraint(ConstraintViolation),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated: bad credentials, or an invalid, expired or revoked token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ConstraintViolation> for AppError {
    fn from(value: ConstraintViolation) -> Self {
        Self::Constraint(value)
    }
}

impl AppError {
    /// Returns the constraint violation carried by this error, if any.
    #[must_use]
    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            Self::Constraint(violation) => Some(violation),
            _ => None,
        }
    }
}
