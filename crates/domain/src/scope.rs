//! Conditional restrictions over resource attributes.

use std::collections::BTreeMap;

use castellan_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::permission::{PermissionCode, WILDCARD, permission_grants};
use crate::user::UserId;

/// One stored condition value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeCondition {
    /// Exact string match; `"*"` matches any value.
    Text(String),
    /// Matches when any element matches.
    AnyOf(Vec<ScopeCondition>),
    /// Nested object; every key must be present and match.
    AllOf(BTreeMap<String, ScopeCondition>),
    /// Numbers, booleans and null compare by equality.
    Exact(Value),
}

impl ScopeCondition {
    /// Interprets a stored JSON value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::AnyOf(items.iter().map(Self::from_value).collect()),
            Value::Object(fields) => Self::AllOf(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from_value(value)))
                    .collect(),
            ),
            other => Self::Exact(other.clone()),
        }
    }

    /// Converts back into JSON for storage and transport.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::AnyOf(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::AllOf(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, condition)| (key.clone(), condition.to_value()))
                    .collect(),
            ),
            Self::Exact(value) => value.clone(),
        }
    }

    /// Checks a runtime attribute value against this condition.
    #[must_use]
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Self::Text(expected) if expected == WILDCARD => true,
            Self::Text(expected) => candidate.as_str() == Some(expected.as_str()),
            Self::AnyOf(options) => options.iter().any(|option| option.matches(candidate)),
            Self::AllOf(fields) => candidate
                .as_object()
                .is_some_and(|context| matches_all(fields, context)),
            Self::Exact(expected) => expected == candidate,
        }
    }
}

fn matches_all(fields: &BTreeMap<String, ScopeCondition>, context: &Map<String, Value>) -> bool {
    fields.iter().all(|(key, condition)| {
        context
            .get(key)
            .is_some_and(|candidate| condition.matches(candidate))
    })
}

/// A JSON object of conditions, keyed by resource attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ScopeConditions(BTreeMap<String, ScopeCondition>);

impl ScopeConditions {
    /// Parses a stored condition document; must be a JSON object.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        let Value::Object(fields) = value else {
            return Err(AppError::Validation(
                "scope conditions must be a JSON object".to_owned(),
            ));
        };

        Ok(Self(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), ScopeCondition::from_value(value)))
                .collect(),
        ))
    }

    /// Returns the condition document as JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(key, condition)| (key.clone(), condition.to_value()))
                .collect(),
        )
    }

    /// Returns whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every stored key must be present in `context` and match. Missing keys fail closed.
    #[must_use]
    pub fn evaluate(&self, context: &Map<String, Value>) -> bool {
        matches_all(&self.0, context)
    }
}

impl TryFrom<Value> for ScopeConditions {
    type Error = AppError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl From<ScopeConditions> for Value {
    fn from(value: ScopeConditions) -> Self {
        value.to_json()
    }
}

/// A restriction stored for a user, optionally limited to one permission pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScope {
    id: Uuid,
    user_id: UserId,
    permission: Option<PermissionCode>,
    conditions: ScopeConditions,
}

impl UserScope {
    /// Creates a scope row.
    #[must_use]
    pub fn new(
        id: Uuid,
        user_id: UserId,
        permission: Option<PermissionCode>,
        conditions: ScopeConditions,
    ) -> Self {
        Self {
            id,
            user_id,
            permission,
            conditions,
        }
    }

    /// Returns the scope identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the restricted user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the narrowed permission pattern; `None` narrows every permission.
    #[must_use]
    pub fn permission(&self) -> Option<PermissionCode> {
        self.permission
    }

    /// Returns the stored conditions.
    #[must_use]
    pub fn conditions(&self) -> &ScopeConditions {
        &self.conditions
    }

    /// Returns whether this row restricts checks for `required`.
    #[must_use]
    pub fn applies_to(&self, required: &str) -> bool {
        self.permission
            .is_none_or(|pattern| permission_grants(&pattern.to_string(), required))
    }
}

/// Outcome of evaluating a user's scopes for one permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    /// No stored row applies; the user is unrestricted for this permission.
    Unrestricted,
    /// At least one applicable row matched the resource.
    Allowed,
    /// Rows apply but none matched, or no resource context was supplied.
    Denied,
}

impl ScopeDecision {
    /// Returns whether the check may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Evaluates stored rows against an optional resource context.
#[must_use]
pub fn evaluate_scopes(
    scopes: &[UserScope],
    required: &str,
    context: Option<&Map<String, Value>>,
) -> ScopeDecision {
    let mut applicable = scopes.iter().filter(|scope| scope.applies_to(required)).peekable();
    if applicable.peek().is_none() {
        return ScopeDecision::Unrestricted;
    }

    let Some(context) = context else {
        return ScopeDecision::Denied;
    };

    if applicable.any(|scope| scope.conditions().evaluate(context)) {
        ScopeDecision::Allowed
    } else {
        ScopeDecision::Denied
    }
}
