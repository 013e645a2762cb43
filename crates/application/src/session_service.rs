//! Session lifecycle: login, bearer authentication, logout and password changes.
//!
//! Authentication failures always surface as the same generic `Unauthorized` message; the
//! specific reason is only logged.

use std::collections::BTreeSet;
use std::sync::Arc;

use castellan_core::{AppError, AppResult, UserIdentity};
use castellan_domain::{AuditAction, RevocationReason, UserId, validate_password};
use tracing::{debug, info, warn};

use crate::{
    AuditEvent, AuditRepository, IssuedSession, PasswordHasher, PermissionResolver,
    SessionTokenCodec, TokenRevocationRegistry, UserAccount, UserDirectory,
};

const INVALID_CREDENTIALS: &str = "invalid credentials";
const INVALID_SESSION: &str = "invalid or expired session";

/// A validated bearer token with freshly computed permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Caller identity.
    pub identity: UserIdentity,
    /// Highest-precedence role name right now.
    pub role: Option<String>,
    /// Effective permissions right now.
    pub permissions: BTreeSet<String>,
}

/// Issues and validates session tokens.
#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserDirectory>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_codec: Arc<dyn SessionTokenCodec>,
    resolver: PermissionResolver,
    revocations: TokenRevocationRegistry,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SessionService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_codec: Arc<dyn SessionTokenCodec>,
        resolver: PermissionResolver,
        revocations: TokenRevocationRegistry,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            users,
            password_hasher,
            token_codec,
            resolver,
            revocations,
            audit_repository,
        }
    }

    /// Verifies a password and issues a token carrying the current permission snapshot.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<IssuedSession> {
        let Some(user) = self.users.find_user_by_username(username.trim()).await? else {
            // Keep the response time of unknown users close to that of known ones.
            let _ = self.password_hasher.hash_password(password);
            warn!(username, "login rejected: unknown user");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        };

        if !self
            .password_hasher
            .verify_password(password, &user.password_hash)?
        {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login rejected: account disabled");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        }

        let effective = self.resolver.user_permissions(user.id).await?;
        let session = self.token_codec.issue(
            user.id,
            &user.username,
            effective.primary_role_name().map(str::to_owned),
            effective.permissions.iter().cloned().collect(),
        )?;

        info!(user_id = %user.id, roles = effective.roles.len(), "session issued");
        Ok(session)
    }

    /// Validates a bearer token: signature and expiry, revocation, account state.
    pub async fn authenticate(&self, token: &str) -> AppResult<AuthenticatedSession> {
        let claims = self.token_codec.decode(token).map_err(|error| {
            debug!(error = %error, "bearer token rejected by codec");
            AppError::Unauthorized(INVALID_SESSION.to_owned())
        })?;

        if !self
            .revocations
            .is_valid(&claims.token_id, claims.user_id, claims.issued_at)
            .await
        {
            warn!(user_id = %claims.user_id, "bearer token rejected: revoked");
            return Err(AppError::Unauthorized(INVALID_SESSION.to_owned()));
        }

        let user = self.active_user(claims.user_id).await?;
        let effective = self.resolver.user_permissions(user.id).await?;

        Ok(AuthenticatedSession {
            identity: UserIdentity::new(
                user.id.as_uuid(),
                user.username,
                claims.token_id,
                claims.issued_at,
            ),
            role: effective.primary_role_name().map(str::to_owned),
            permissions: effective.permissions,
        })
    }

    /// Revokes the token that authenticated the caller.
    pub async fn logout(&self, identity: &UserIdentity) -> AppResult<()> {
        self.revocations
            .revoke(
                identity.token_id(),
                UserId::from_uuid(identity.user_id()),
                RevocationReason::Logout,
            )
            .await
    }

    /// Replaces the caller's password and revokes every session issued so far.
    pub async fn change_password(
        &self,
        identity: &UserIdentity,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.active_user(UserId::from_uuid(identity.user_id())).await?;
        if !self
            .password_hasher
            .verify_password(current_password, &user.password_hash)?
        {
            warn!(user_id = %user.id, "password change rejected: wrong current password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        }

        validate_password(new_password)?;
        let password_hash = self.password_hasher.hash_password(new_password)?;
        self.users
            .update_password_hash(user.id, &password_hash)
            .await?;
        self.revocations
            .revoke_all(user.id, RevocationReason::PasswordChange)
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                subject: user.username.clone(),
                action: AuditAction::PasswordChanged,
                resource_type: "user".to_owned(),
                resource_id: user.id.to_string(),
                detail: Some("password changed; all sessions revoked".to_owned()),
            })
            .await
    }

    /// Revokes every session of a user.
    pub async fn terminate_sessions(&self, user_id: UserId) -> AppResult<()> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        self.revocations
            .revoke_all(user_id, RevocationReason::SessionTerminated)
            .await
    }

    async fn active_user(&self, user_id: UserId) -> AppResult<UserAccount> {
        match self.users.find_user(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            Some(_) => {
                warn!(user_id = %user_id, "session rejected: account disabled");
                Err(AppError::Unauthorized(INVALID_SESSION.to_owned()))
            }
            None => {
                warn!(user_id = %user_id, "session rejected: account missing");
                Err(AppError::Unauthorized(INVALID_SESSION.to_owned()))
            }
        }
    }
}

#[cfg(test)]
mod tests;
