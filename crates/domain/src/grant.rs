use std::str::FromStr;

use castellan_core::{AppError, AppResult, ConstraintViolation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::RoleId;
use crate::user::UserId;

/// Reason written by the expiry sweep.
pub const AUTO_EXPIRED_REASON: &str = "auto_expired";

/// Unique identifier for a user-role grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(Uuid);

impl GrantId {
    /// Creates a new random grant identifier.
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

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Grant precedence; 1 is the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct GrantPriority(i32);

impl GrantPriority {
    /// Default precedence for new grants.
    pub const DEFAULT: Self = Self(1);

    /// Validates a priority value.
    pub fn new(value: i32) -> AppResult<Self> {
        if value < 1 {
            return Err(AppError::Validation(format!(
                "grant priority must be at least 1, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for GrantPriority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for GrantPriority {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GrantPriority> for i32 {
    fn from(value: GrantPriority) -> Self {
        value.0
    }
}

/// Lifecycle state of a grant. `Revoked` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// In force, subject to the validity window.
    Active,
    /// Withdrawn by an administrator.
    Revoked,
    /// Lapsed and closed by the expiry sweep.
    Expired,
}

impl GrantStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for GrantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown grant status '{value}'"
            ))),
        }
    }
}

/// Input for a new grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    /// Grantee.
    pub user_id: UserId,
    /// Granted role.
    pub role_id: RoleId,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// End of validity, open-ended when absent.
    pub valid_to: Option<DateTime<Utc>>,
    /// Precedence among the user's grants.
    pub priority: GrantPriority,
    /// Administrator who made the assignment.
    pub assigned_by: Option<UserId>,
    /// Free-text justification.
    pub reason: Option<String>,
}

/// Every stored column of a grant, used to rehydrate from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// Grant identifier.
    pub id: GrantId,
    /// Grantee.
    pub user_id: UserId,
    /// Granted role.
    pub role_id: RoleId,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// End of validity.
    pub valid_to: Option<DateTime<Utc>>,
    /// Precedence.
    pub priority: GrantPriority,
    /// Lifecycle state.
    pub status: GrantStatus,
    /// Assigning administrator.
    pub assigned_by: Option<UserId>,
    /// Assignment reason.
    pub assigned_reason: Option<String>,
    /// Administrator behind the latest amendment.
    pub updated_by: Option<UserId>,
    /// Revoking administrator.
    pub revoked_by: Option<UserId>,
    /// Revocation or expiry reason.
    pub revoked_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last change timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Changes applied by an update of an active grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantAmendment {
    /// New priority.
    pub priority: Option<GrantPriority>,
    /// New end of validity.
    pub valid_to: Option<DateTime<Utc>>,
    /// Administrator applying the change.
    pub updated_by: Option<UserId>,
    /// Replacement justification.
    pub reason: Option<String>,
}

/// A time-bounded assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleGrant {
    id: GrantId,
    user_id: UserId,
    role_id: RoleId,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    priority: GrantPriority,
    status: GrantStatus,
    assigned_by: Option<UserId>,
    assigned_reason: Option<String>,
    updated_by: Option<UserId>,
    revoked_by: Option<UserId>,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRoleGrant {
    /// Creates an active grant. `valid_to` must be after `valid_from`.
    pub fn new(input: NewGrant, now: DateTime<Utc>) -> AppResult<Self> {
        validate_window(input.valid_from, input.valid_to)?;

        Ok(Self {
            id: GrantId::new(),
            user_id: input.user_id,
            role_id: input.role_id,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            priority: input.priority,
            status: GrantStatus::Active,
            assigned_by: input.assigned_by,
            assigned_reason: clean_reason(input.reason),
            updated_by: None,
            revoked_by: None,
            revoked_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Restores a stored grant without re-validating its window.
    #[must_use]
    pub fn from_record(record: GrantRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            role_id: record.role_id,
            valid_from: record.valid_from,
            valid_to: record.valid_to,
            priority: record.priority,
            status: record.status,
            assigned_by: record.assigned_by,
            assigned_reason: record.assigned_reason,
            updated_by: record.updated_by,
            revoked_by: record.revoked_by,
            revoked_reason: record.revoked_reason,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn id(&self) -> GrantId {
        self.id
    }

    /// Returns the grantee.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the granted role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the start of validity.
    #[must_use]
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// Returns the end of validity.
    #[must_use]
    pub fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    /// Returns the precedence.
    #[must_use]
    pub fn priority(&self) -> GrantPriority {
        self.priority
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> GrantStatus {
        self.status
    }

    /// Returns the assigning administrator.
    #[must_use]
    pub fn assigned_by(&self) -> Option<UserId> {
        self.assigned_by
    }

    /// Returns the assignment reason.
    #[must_use]
    pub fn assigned_reason(&self) -> Option<&str> {
        self.assigned_reason.as_deref()
    }

    /// Returns the administrator behind the latest amendment.
    #[must_use]
    pub fn updated_by(&self) -> Option<UserId> {
        self.updated_by
    }

    /// Returns the revoking administrator.
    #[must_use]
    pub fn revoked_by(&self) -> Option<UserId> {
        self.revoked_by
    }

    /// Returns the revocation or expiry reason.
    #[must_use]
    pub fn revoked_reason(&self) -> Option<&str> {
        self.revoked_reason.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last change timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether the status is `Active`, regardless of the window.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }

    /// Active and inside `[valid_from, valid_to)` at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self.valid_from <= now
            && self.valid_to.is_none_or(|valid_to| valid_to > now)
    }

    /// Active but past its `valid_to`; the sweep closes such grants.
    #[must_use]
    pub fn has_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.valid_to.is_some_and(|valid_to| valid_to <= now)
    }

    /// Active → Revoked. Closes the window at `now`, or at its start if it has not opened.
    pub fn revoke(
        &mut self,
        revoked_by: Option<UserId>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.ensure_active()?;
        self.status = GrantStatus::Revoked;
        self.valid_to = Some(now.max(self.valid_from));
        self.revoked_by = revoked_by;
        self.revoked_reason = clean_reason(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Active → Expired, only once the window has lapsed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_active()?;
        if !self.has_lapsed_at(now) {
            return Err(AppError::Validation(format!(
                "grant '{}' has not lapsed yet",
                self.id
            )));
        }

        self.status = GrantStatus::Expired;
        self.revoked_reason = Some(AUTO_EXPIRED_REASON.to_owned());
        self.updated_at = now;
        Ok(())
    }

    /// Active → Active with a new priority, end of validity or reason.
    pub fn amend(&mut self, amendment: GrantAmendment, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_active()?;

        let valid_to = amendment.valid_to.or(self.valid_to);
        validate_window(self.valid_from, valid_to)?;

        if let Some(priority) = amendment.priority {
            self.priority = priority;
        }
        self.valid_to = valid_to;
        if let Some(reason) = clean_reason(amendment.reason) {
            self.assigned_reason = Some(reason);
        }
        if amendment.updated_by.is_some() {
            self.updated_by = amendment.updated_by;
        }
        self.updated_at = now;
        Ok(())
    }

    fn ensure_active(&self) -> AppResult<()> {
        if self.is_active() {
            return Ok(());
        }

        Err(ConstraintViolation::NoActiveGrant.into())
    }
}

/// Picks the grant with the lowest priority value, ties broken by earliest creation.
pub fn highest_priority<'a>(
    grants: impl IntoIterator<Item = &'a UserRoleGrant>,
) -> Option<&'a UserRoleGrant> {
    grants
        .into_iter()
        .min_by_key(|grant| (grant.priority(), grant.created_at()))
}

fn validate_window(
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
) -> AppResult<()> {
    match valid_to {
        Some(valid_to) if valid_to <= valid_from => Err(AppError::Validation(
            "valid_to must be after valid_from".to_owned(),
        )),
        _ => Ok(()),
    }
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use castellan_core::ConstraintViolation;
    use chrono::{Duration, Utc};

    use super::{
        AUTO_EXPIRED_REASON, GrantAmendment, GrantPriority, GrantStatus, NewGrant, UserRoleGrant,
        highest_priority,
    };
    use crate::role::RoleId;
    use crate::user::UserId;

    fn new_grant(priority: i32, valid_to: Option<chrono::DateTime<Utc>>) -> NewGrant {
        NewGrant {
            user_id: UserId::new(),
            role_id: RoleId::new(),
            valid_from: Utc::now() - Duration::hours(1),
            valid_to,
            priority: GrantPriority::new(priority).unwrap_or_default(),
            assigned_by: None,
            reason: Some("onboarding".to_owned()),
        }
    }

    #[test]
    fn priority_below_one_is_rejected() {
        assert!(GrantPriority::new(0).is_err());
        assert!(GrantPriority::new(-3).is_err());
        assert_eq!(GrantPriority::new(4).map(|p| p.value()).unwrap_or(0), 4);
    }

    #[test]
    fn window_must_move_forward() {
        let input = new_grant(1, Some(Utc::now() - Duration::hours(2)));
        assert!(UserRoleGrant::new(input, Utc::now()).is_err());
    }

    #[test]
    fn effective_window_is_half_open() {
        let now = Utc::now();
        let grant = UserRoleGrant::new(new_grant(1, Some(now)), now - Duration::minutes(5))
            .unwrap_or_else(|_| unreachable!());
        assert!(grant.is_effective_at(now - Duration::seconds(1)));
        assert!(!grant.is_effective_at(now));
        assert!(grant.has_lapsed_at(now));
    }

    #[test]
    fn revoke_is_terminal() {
        let now = Utc::now();
        let mut grant =
            UserRoleGrant::new(new_grant(1, None), now).unwrap_or_else(|_| unreachable!());

        assert!(grant.revoke(None, Some("left team".to_owned()), now).is_ok());
        assert_eq!(grant.status(), GrantStatus::Revoked);
        assert_eq!(grant.valid_to(), Some(now));
        assert!(!grant.is_effective_at(now));

        let second = grant.revoke(None, None, now);
        assert_eq!(
            second.err().and_then(|error| error.constraint().cloned()),
            Some(ConstraintViolation::NoActiveGrant)
        );
        assert!(grant.amend(GrantAmendment::default(), now).is_err());
    }

    #[test]
    fn revoking_a_future_grant_leaves_an_empty_window() {
        let now = Utc::now();
        let starts = now + Duration::days(3);
        let mut grant = UserRoleGrant::new(
            NewGrant {
                valid_from: starts,
                ..new_grant(1, None)
            },
            now,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(grant.revoke(None, None, now).is_ok());
        assert_eq!(grant.valid_to(), Some(starts));
        assert!(!grant.is_effective_at(starts));
    }

    #[test]
    fn expire_requires_lapsed_window() {
        let now = Utc::now();
        let mut open_ended =
            UserRoleGrant::new(new_grant(1, None), now).unwrap_or_else(|_| unreachable!());
        assert!(open_ended.expire(now).is_err());

        let mut lapsed = UserRoleGrant::new(new_grant(1, Some(now - Duration::minutes(1))), now)
            .unwrap_or_else(|_| unreachable!());
        assert!(lapsed.expire(now).is_ok());
        assert_eq!(lapsed.status(), GrantStatus::Expired);
        assert_eq!(lapsed.revoked_reason(), Some(AUTO_EXPIRED_REASON));
    }

    #[test]
    fn amend_keeps_grant_active() {
        let now = Utc::now();
        let mut grant =
            UserRoleGrant::new(new_grant(3, None), now).unwrap_or_else(|_| unreachable!());
        let amendment = GrantAmendment {
            priority: GrantPriority::new(1).ok(),
            valid_to: Some(now + Duration::days(30)),
            updated_by: None,
            reason: Some("promoted".to_owned()),
        };

        assert!(grant.amend(amendment, now).is_ok());
        assert!(grant.is_active());
        assert_eq!(grant.priority().value(), 1);
        assert_eq!(grant.assigned_reason(), Some("promoted"));
    }

    #[test]
    fn amend_records_updater_without_touching_assigner() {
        let now = Utc::now();
        let assigner = UserId::new();
        let updater = UserId::new();
        let mut input = new_grant(3, None);
        input.assigned_by = Some(assigner);
        let mut grant = UserRoleGrant::new(input, now).unwrap_or_else(|_| unreachable!());

        let amendment = GrantAmendment {
            priority: GrantPriority::new(2).ok(),
            updated_by: Some(updater),
            ..GrantAmendment::default()
        };

        assert!(grant.amend(amendment, now).is_ok());
        assert_eq!(grant.assigned_by(), Some(assigner));
        assert_eq!(grant.updated_by(), Some(updater));
    }

    #[test]
    fn highest_priority_prefers_lower_value_then_older_grant() {
        let now = Utc::now();
        let older = UserRoleGrant::new(new_grant(2, None), now - Duration::minutes(10))
            .unwrap_or_else(|_| unreachable!());
        let newer = UserRoleGrant::new(new_grant(2, None), now)
            .unwrap_or_else(|_| unreachable!());
        let low = UserRoleGrant::new(new_grant(5, None), now - Duration::hours(1))
            .unwrap_or_else(|_| unreachable!());

        let grants = [newer, low, older.clone()];
        assert_eq!(highest_priority(&grants).map(UserRoleGrant::id), Some(older.id()));
    }
}
