use castellan_core::{AppError, AppResult, ConstraintViolation, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of levels in the role tree. Roots are level 0, so the deepest role sits at 4.
pub const MAX_ROLE_LEVELS: usize = 5;

const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
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

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A node of the role tree. Direct permissions are stored alongside, not on the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    display_name: NonEmptyString,
    description: Option<String>,
    parent_id: Option<RoleId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a role, rejecting over-long names and self-parenting.
    pub fn new(
        id: RoleId,
        name: NonEmptyString,
        display_name: NonEmptyString,
        description: Option<String>,
        parent_id: Option<RoleId>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        validate_role_name(&name)?;
        if parent_id == Some(id) {
            return Err(ConstraintViolation::SelfParent.into());
        }

        Ok(Self {
            id,
            name,
            display_name,
            description: description
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            parent_id,
            created_at,
            updated_at: created_at,
        })
    }

    /// Restores the last-modified timestamp of a stored role.
    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the parent role, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<RoleId> {
        self.parent_id
    }

    /// Returns when the role was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the role was last modified.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Renames the role.
    pub fn rename(&mut self, name: NonEmptyString, now: DateTime<Utc>) -> AppResult<()> {
        validate_role_name(&name)?;
        self.name = name;
        self.updated_at = now;
        Ok(())
    }

    /// Replaces the display name.
    pub fn relabel(&mut self, display_name: NonEmptyString, now: DateTime<Utc>) {
        self.display_name = display_name;
        self.updated_at = now;
    }

    /// Replaces the description. Blank clears it.
    pub fn describe(&mut self, description: Option<String>, now: DateTime<Utc>) {
        self.description = description
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        self.updated_at = now;
    }

    /// Moves the role under another parent. Tree-wide checks belong to `RoleHierarchy`.
    pub fn move_under(&mut self, parent_id: Option<RoleId>, now: DateTime<Utc>) -> AppResult<()> {
        if parent_id == Some(self.id) {
            return Err(ConstraintViolation::SelfParent.into());
        }

        self.parent_id = parent_id;
        self.updated_at = now;
        Ok(())
    }
}

fn validate_role_name(name: &NonEmptyString) -> AppResult<()> {
    if name.as_str().chars().count() > ROLE_NAME_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "role name must not exceed {ROLE_NAME_MAX_LENGTH} characters"
        )));
    }

    Ok(())
}
