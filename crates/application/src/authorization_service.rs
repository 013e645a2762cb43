use std::sync::Arc;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    PermissionCode, ScopeConditions, ScopeDecision, UserId, UserScope, evaluate_scopes,
    is_valid_permission,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{PermissionResolver, UserScopeRepository};

const DENIED_MESSAGE: &str = "insufficient permissions";

/// Input payload for one scope restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeInput {
    /// Permission pattern narrowed by the row; `None` narrows every permission.
    pub permission: Option<String>,
    /// JSON object of conditions.
    pub conditions: Value,
}

/// Decides whether a user may perform an action, optionally on a scoped resource.
#[derive(Clone)]
pub struct AuthorizationService {
    resolver: PermissionResolver,
    scopes: Arc<dyn UserScopeRepository>,
}

impl AuthorizationService {
    /// Creates the service.
    #[must_use]
    pub fn new(resolver: PermissionResolver, scopes: Arc<dyn UserScopeRepository>) -> Self {
        Self { resolver, scopes }
    }

    /// Fails with a generic `Forbidden` unless the user holds `required` and, when the user has
    /// applicable scope restrictions, the resource context satisfies one of them.
    pub async fn authorize(
        &self,
        user_id: UserId,
        required: &str,
        resource_scope: Option<&Map<String, Value>>,
    ) -> AppResult<()> {
        if !is_valid_permission(required) {
            return Err(AppError::Validation(format!(
                "'{required}' is not a valid permission"
            )));
        }

        let effective = self.resolver.user_permissions(user_id).await?;
        if !effective.allows(required) {
            warn!(user_id = %user_id, required, "permission denied: not held");
            return Err(AppError::Forbidden(DENIED_MESSAGE.to_owned()));
        }

        let scopes = self.scopes.list_user_scopes(user_id).await?;
        match evaluate_scopes(&scopes, required, resource_scope) {
            ScopeDecision::Denied => {
                warn!(
                    user_id = %user_id,
                    required,
                    has_resource_scope = resource_scope.is_some(),
                    "permission denied: scope restriction"
                );
                Err(AppError::Forbidden(DENIED_MESSAGE.to_owned()))
            }
            decision => {
                debug!(user_id = %user_id, required, ?decision, "permission granted");
                Ok(())
            }
        }
    }

    /// Same as [`Self::authorize`] but reports a denial as `false`.
    pub async fn is_authorized(
        &self,
        user_id: UserId,
        required: &str,
        resource_scope: Option<&Map<String, Value>>,
    ) -> AppResult<bool> {
        match self.authorize(user_id, required, resource_scope).await {
            Ok(()) => Ok(true),
            Err(AppError::Forbidden(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Lists the stored scope restrictions of a user.
    pub async fn user_scopes(&self, user_id: UserId) -> AppResult<Vec<UserScope>> {
        self.scopes.list_user_scopes(user_id).await
    }

    /// Replaces the scope restrictions of a user. An empty list lifts every restriction.
    pub async fn replace_user_scopes(
        &self,
        user_id: UserId,
        inputs: Vec<ScopeInput>,
    ) -> AppResult<Vec<UserScope>> {
        let scopes = inputs
            .into_iter()
            .map(|input| -> AppResult<UserScope> {
                let permission = input
                    .permission
                    .as_deref()
                    .map(PermissionCode::parse)
                    .transpose()?;
                let conditions = ScopeConditions::from_json(&input.conditions)?;
                Ok(UserScope::new(Uuid::new_v4(), user_id, permission, conditions))
            })
            .collect::<AppResult<Vec<_>>>()?;

        self.scopes
            .replace_user_scopes(user_id, scopes.clone())
            .await?;
        Ok(scopes)
    }

    /// Returns the resolver behind this service.
    #[must_use]
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }
}
