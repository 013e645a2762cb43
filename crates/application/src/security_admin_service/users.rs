use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{AuditAction, UserId, UserScope};
use serde_json::{Map, Value};

use super::SecurityAdminService;
use crate::{EffectivePermissions, ScopeInput};

impl SecurityAdminService {
    /// Lists scope restrictions. Users may read their own; others need `user:read`.
    pub async fn user_scopes(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Vec<UserScope>> {
        self.require_self_or(actor, user_id, "user:read").await?;
        self.authorization.user_scopes(user_id).await
    }

    /// Replaces scope restrictions. Requires `user:manage`.
    pub async fn set_user_scopes(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        scopes: Vec<ScopeInput>,
    ) -> AppResult<Vec<UserScope>> {
        self.require(actor, "user:manage").await?;
        let stored = self
            .authorization
            .replace_user_scopes(user_id, scopes)
            .await?;

        self.record(
            actor,
            AuditAction::UserScopesReplaced,
            "user",
            user_id.to_string(),
            format!("replaced scopes; {} rows", stored.len()),
        )
        .await?;

        Ok(stored)
    }

    /// Effective permissions of a user. Users may read their own; others need `user:read`.
    pub async fn effective_permissions(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<EffectivePermissions> {
        self.require_self_or(actor, user_id, "user:read").await?;
        self.authorization.resolver().user_permissions(user_id).await
    }

    /// Answers whether `user_id` may perform `required`. Checking someone else needs `user:read`.
    pub async fn check_authorization(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        required: &str,
        context: Option<&Map<String, Value>>,
    ) -> AppResult<bool> {
        self.require_self_or(actor, user_id, "user:read").await?;
        self.authorization
            .is_authorized(user_id, required, context)
            .await
    }

    /// Revokes every session of a user. Requires `user:manage`.
    pub async fn terminate_sessions(&self, actor: &UserIdentity, user_id: UserId) -> AppResult<()> {
        self.require(actor, "user:manage").await?;
        self.sessions.terminate_sessions(user_id).await?;

        self.record(
            actor,
            AuditAction::SessionsTerminated,
            "user",
            user_id.to_string(),
            "terminated all sessions".to_owned(),
        )
        .await
    }
}
