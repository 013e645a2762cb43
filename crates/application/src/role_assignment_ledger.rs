use std::sync::Arc;

use castellan_core::{AppError, AppResult, ConstraintViolation};
use castellan_domain::{
    GrantAmendment, GrantPriority, NewGrant, RoleId, UserId, UserRoleGrant, highest_priority,
};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{RoleRepository, UserDirectory, UserRoleRepository};

/// Input payload for assigning a role to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// Grantee.
    pub user_id: UserId,
    /// Role to grant.
    pub role_id: RoleId,
    /// Start of validity; defaults to now.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity; open-ended when absent.
    pub valid_to: Option<DateTime<Utc>>,
    /// Precedence; 1 is highest.
    pub priority: GrantPriority,
    /// Assigning administrator.
    pub assigned_by: Option<UserId>,
    /// Justification.
    pub reason: Option<String>,
}

/// Per-user role grants with temporal validity and priority.
#[derive(Clone)]
pub struct RoleAssignmentLedger {
    grants: Arc<dyn UserRoleRepository>,
    users: Arc<dyn UserDirectory>,
    roles: Arc<dyn RoleRepository>,
}

impl RoleAssignmentLedger {
    /// Creates the ledger.
    #[must_use]
    pub fn new(
        grants: Arc<dyn UserRoleRepository>,
        users: Arc<dyn UserDirectory>,
        roles: Arc<dyn RoleRepository>,
    ) -> Self {
        Self {
            grants,
            users,
            roles,
        }
    }

    /// Grants a role. At most one active grant per user and role.
    pub async fn assign(&self, input: AssignRoleInput) -> AppResult<UserRoleGrant> {
        if self.users.find_user(input.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "user '{}' not found",
                input.user_id
            )));
        }
        if self.roles.find_role(input.role_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "role '{}' not found",
                input.role_id
            )));
        }

        let now = Utc::now();
        let grant = UserRoleGrant::new(
            NewGrant {
                user_id: input.user_id,
                role_id: input.role_id,
                valid_from: input.valid_from.unwrap_or(now),
                valid_to: input.valid_to,
                priority: input.priority,
                assigned_by: input.assigned_by,
                reason: input.reason,
            },
            now,
        )?;

        let grant = self.grants.insert_grant(grant).await?;
        info!(
            grant_id = %grant.id(),
            user_id = %grant.user_id(),
            role_id = %grant.role_id(),
            priority = grant.priority().value(),
            "role granted"
        );

        Ok(grant)
    }

    /// Revokes the active grant of a role.
    pub async fn revoke(
        &self,
        user_id: UserId,
        role_id: RoleId,
        revoked_by: Option<UserId>,
        reason: Option<String>,
    ) -> AppResult<UserRoleGrant> {
        let mut grant = self.active_grant(user_id, role_id).await?;
        grant.revoke(revoked_by, reason, Utc::now())?;

        let grant = self.grants.save_transition(&grant).await?;
        info!(grant_id = %grant.id(), user_id = %user_id, role_id = %role_id, "role grant revoked");
        Ok(grant)
    }

    /// Changes priority, end of validity or reason of the active grant.
    pub async fn update(
        &self,
        user_id: UserId,
        role_id: RoleId,
        amendment: GrantAmendment,
    ) -> AppResult<UserRoleGrant> {
        let mut grant = self.active_grant(user_id, role_id).await?;
        grant.amend(amendment, Utc::now())?;

        let grant = self.grants.save_transition(&grant).await?;
        info!(grant_id = %grant.id(), user_id = %user_id, role_id = %role_id, "role grant updated");
        Ok(grant)
    }

    /// Grants in force right now, ordered by precedence.
    pub async fn active_roles(&self, user_id: UserId) -> AppResult<Vec<UserRoleGrant>> {
        let now = Utc::now();
        let mut grants: Vec<UserRoleGrant> = self
            .grants
            .list_user_grants(user_id, true)
            .await?
            .into_iter()
            .filter(|grant| grant.is_effective_at(now))
            .collect();
        grants.sort_by_key(|grant| (grant.priority(), grant.created_at()));
        Ok(grants)
    }

    /// The grant in force with the lowest priority value; earliest wins ties.
    pub async fn highest_priority_role(&self, user_id: UserId) -> AppResult<Option<UserRoleGrant>> {
        let grants = self.active_roles(user_id).await?;
        Ok(highest_priority(&grants).cloned())
    }

    /// Grant history of a user, or only the rows with status `active`.
    pub async fn list_user_roles(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> AppResult<Vec<UserRoleGrant>> {
        self.grants.list_user_grants(user_id, active_only).await
    }

    /// Closes every lapsed active grant with reason `auto_expired`.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let expired = self.grants.expire_lapsed_grants(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "expired lapsed role grants");
        }
        Ok(expired)
    }

    async fn active_grant(&self, user_id: UserId, role_id: RoleId) -> AppResult<UserRoleGrant> {
        self.grants
            .find_active_grant(user_id, role_id)
            .await?
            .ok_or_else(|| ConstraintViolation::NoActiveGrant.into())
    }
}

#[cfg(test)]
mod tests;
