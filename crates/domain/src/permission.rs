use std::str::FromStr;

use castellan_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token used for "any module" / "any action".
pub const WILDCARD: &str = "*";

/// Functional areas a permission can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModule {
    /// User accounts.
    User,
    /// Organizational departments.
    Department,
    /// Roles and the role tree.
    Role,
    /// The permission catalog itself.
    Permission,
    /// Audit log.
    Audit,
    /// Platform administration.
    System,
    /// Reporting.
    Report,
    /// Inventory records.
    Inventory,
    /// Projects.
    Project,
}

impl PermissionModule {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Department => "department",
            Self::Role => "role",
            Self::Permission => "permission",
            Self::Audit => "audit",
            Self::System => "system",
            Self::Report => "report",
            Self::Inventory => "inventory",
            Self::Project => "project",
        }
    }

    /// Returns every module in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionModule] = &[
            PermissionModule::User,
            PermissionModule::Department,
            PermissionModule::Role,
            PermissionModule::Permission,
            PermissionModule::Audit,
            PermissionModule::System,
            PermissionModule::Report,
            PermissionModule::Inventory,
            PermissionModule::Project,
        ];

        ALL
    }
}

impl FromStr for PermissionModule {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|module| module.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission module '{value}'")))
    }
}

/// Operations a permission can allow within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    /// Create records.
    Create,
    /// Read a single record.
    Read,
    /// Generic write access.
    Write,
    /// Modify existing records.
    Update,
    /// Remove records.
    Delete,
    /// Enumerate records.
    List,
    /// Administer the module (assignments, configuration).
    Manage,
    /// Export data out of the platform.
    Export,
    /// Full administrative control; only meaningful for `system`.
    Admin,
}

impl PermissionAction {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Write => "write",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Manage => "manage",
            Self::Export => "export",
            Self::Admin => "admin",
        }
    }

    /// Returns every action in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionAction] = &[
            PermissionAction::Create,
            PermissionAction::Read,
            PermissionAction::Write,
            PermissionAction::Update,
            PermissionAction::Delete,
            PermissionAction::List,
            PermissionAction::Manage,
            PermissionAction::Export,
            PermissionAction::Admin,
        ];

        ALL
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission action '{value}'")))
    }
}

/// One half of a permission code: a concrete value or the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector<T> {
    /// Matches every value.
    Any,
    /// Matches exactly one value.
    Only(T),
}

impl<T: FromStr<Err = AppError>> Selector<T> {
    fn parse(value: &str) -> AppResult<Self> {
        if value == WILDCARD {
            return Ok(Self::Any);
        }

        T::from_str(value).map(Self::Only)
    }
}

impl<T: Copy> Selector<T> {
    /// Returns the concrete value, if this is not the wildcard.
    #[must_use]
    pub fn concrete(&self) -> Option<T> {
        match self {
            Self::Any => None,
            Self::Only(value) => Some(*value),
        }
    }
}

/// Validated `module:action` permission code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode {
    module: Selector<PermissionModule>,
    action: Selector<PermissionAction>,
}

impl PermissionCode {
    /// Builds a concrete code.
    #[must_use]
    pub fn new(module: PermissionModule, action: PermissionAction) -> Self {
        Self {
            module: Selector::Only(module),
            action: Selector::Only(action),
        }
    }

    /// Builds a code from selectors, allowing wildcards on either side.
    #[must_use]
    pub fn from_selectors(
        module: Selector<PermissionModule>,
        action: Selector<PermissionAction>,
    ) -> Self {
        Self { module, action }
    }

    /// Parses `*`, `*:*` or `module:action` where each half is a known value or `*`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if value == WILDCARD {
            return Ok(Self::from_selectors(Selector::Any, Selector::Any));
        }

        let Some((module, action)) = value.split_once(':') else {
            return Err(AppError::Validation(format!(
                "permission '{value}' must have the form module:action"
            )));
        };

        Ok(Self {
            module: Selector::parse(module)?,
            action: Selector::parse(action)?,
        })
    }

    /// Returns the module selector.
    #[must_use]
    pub fn module(&self) -> Selector<PermissionModule> {
        self.module
    }

    /// Returns the action selector.
    #[must_use]
    pub fn action(&self) -> Selector<PermissionAction> {
        self.action
    }

    /// Returns whether either half is a wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self.module, Selector::Any) || matches!(self.action, Selector::Any)
    }

    /// Returns whether the code is a fixed, non-editable catalog entry.
    #[must_use]
    pub fn is_system_reserved(&self) -> bool {
        match (self.module.concrete(), self.action.concrete()) {
            (Some(module), Some(action)) => is_system_reserved(module, action),
            _ => false,
        }
    }

    /// Human-readable label used when seeding catalog entries.
    #[must_use]
    pub fn default_display_name(&self) -> String {
        let module = self.module.concrete().map_or("all modules", |module| module.as_str());
        let action = self.action.concrete().map_or("any action", |action| action.as_str());
        format!("{module}: {action}")
    }
}

impl std::fmt::Display for PermissionCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let module = self.module.concrete().map_or(WILDCARD, |module| module.as_str());
        let action = self.action.concrete().map_or(WILDCARD, |action| action.as_str());
        write!(formatter, "{module}:{action}")
    }
}

impl FromStr for PermissionCode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for PermissionCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<PermissionCode> for String {
    fn from(value: PermissionCode) -> Self {
        value.to_string()
    }
}

/// Returns whether a raw permission string is well formed.
#[must_use]
pub fn is_valid_permission(value: &str) -> bool {
    PermissionCode::parse(value).is_ok()
}

/// Catalog entries that can never be edited or deleted.
pub const SYSTEM_RESERVED_PERMISSIONS: &[(PermissionModule, PermissionAction)] = &[
    (PermissionModule::User, PermissionAction::Read),
    (PermissionModule::User, PermissionAction::List),
    (PermissionModule::Department, PermissionAction::Read),
    (PermissionModule::Department, PermissionAction::List),
    (PermissionModule::Role, PermissionAction::Read),
    (PermissionModule::Role, PermissionAction::List),
    (PermissionModule::Permission, PermissionAction::Read),
    (PermissionModule::Permission, PermissionAction::List),
    (PermissionModule::Audit, PermissionAction::Read),
    (PermissionModule::System, PermissionAction::Admin),
];

/// Returns whether the pair is in the reserved table.
#[must_use]
pub fn is_system_reserved(module: PermissionModule, action: PermissionAction) -> bool {
    SYSTEM_RESERVED_PERMISSIONS.contains(&(module, action))
}

/// Returns whether a held permission string is the global wildcard.
#[must_use]
pub fn is_super_admin(held: &str) -> bool {
    matches!(held.trim(), "*" | "*:*")
}

/// Decides whether `held` covers `required`.
///
/// Accepted shapes: exact match, `*` or `*:*`, `module:*` for any action in that module, and
/// `*:action` for that action in any module. Nothing else is treated as a wildcard.
#[must_use]
pub fn permission_grants(held: &str, required: &str) -> bool {
    let held = held.trim();
    let required = required.trim();

    if is_super_admin(held) || held == required {
        return true;
    }

    let (Some((held_module, held_action)), Some((required_module, required_action))) =
        (held.split_once(':'), required.split_once(':'))
    else {
        return false;
    };

    if required_module.is_empty() || required_action.is_empty() {
        return false;
    }

    match (held_module, held_action) {
        (WILDCARD, action) => action == required_action,
        (module, WILDCARD) => module == required_module,
        _ => false,
    }
}

/// Returns whether any permission in `held` covers `required`.
pub fn any_grants<'a>(held: impl IntoIterator<Item = &'a str>, required: &str) -> bool {
    held.into_iter()
        .any(|permission| permission_grants(permission, required))
}

/// Unique identifier for a catalog permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Uuid);

impl PermissionId {
    /// Creates a new random identifier.
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

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A permission catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    id: PermissionId,
    code: PermissionCode,
    display_name: NonEmptyString,
    description: Option<String>,
    is_system: bool,
}

impl PermissionDefinition {
    /// Creates a catalog entry. `is_system` follows the reserved table.
    #[must_use]
    pub fn new(
        id: PermissionId,
        code: PermissionCode,
        display_name: NonEmptyString,
        description: Option<String>,
    ) -> Self {
        Self {
            id,
            code,
            display_name,
            description: normalize_description(description),
            is_system: code.is_system_reserved(),
        }
    }

    /// Creates the seeded entry for a reserved pair.
    pub fn system(module: PermissionModule, action: PermissionAction) -> AppResult<Self> {
        let code = PermissionCode::new(module, action);
        Ok(Self::new(
            PermissionId::new(),
            code,
            NonEmptyString::new(code.default_display_name())?,
            Some("System permission".to_owned()),
        ))
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the parsed code.
    #[must_use]
    pub fn code(&self) -> PermissionCode {
        self.code
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

    /// Returns whether this entry is system-reserved.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }
}

fn normalize_description(value: Option<String>) -> Option<String> {
    value
        .map(|description| description.trim().to_owned())
        .filter(|description| !description.is_empty())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{
        PermissionAction, PermissionCode, PermissionModule, Selector, is_valid_permission,
        permission_grants,
    };

    #[test]
    fn accepts_wildcard_and_enum_shapes() {
        for value in ["*", "*:*", "user:read", "inventory:*", "*:export", "system:admin"] {
            assert!(is_valid_permission(value), "{value} should be valid");
        }
    }

    #[test]
    fn rejects_unknown_halves_and_malformed_strings() {
        for value in ["", "user", "user:", ":read", "invoice:read", "user:fly", "user:read:x"] {
            assert!(!is_valid_permission(value), "{value} should be invalid");
        }
    }

    #[test]
    fn bare_wildcard_normalizes_to_pair() {
        let code = PermissionCode::parse("*").unwrap_or_else(|_| unreachable!());
        assert_eq!(code.to_string(), "*:*");
        assert!(code.is_wildcard());
    }

    #[test]
    fn reserved_table_only_covers_concrete_codes() {
        let reserved = PermissionCode::from_str("audit:read").unwrap_or_else(|_| unreachable!());
        let editable = PermissionCode::from_str("audit:export").unwrap_or_else(|_| unreachable!());
        let wildcard = PermissionCode::from_selectors(
            Selector::Only(PermissionModule::Audit),
            Selector::Any,
        );

        assert!(reserved.is_system_reserved());
        assert!(!editable.is_system_reserved());
        assert!(!wildcard.is_system_reserved());
    }

    #[test]
    fn wildcard_shapes_follow_the_matching_rules() {
        assert!(permission_grants("*", "report:export"));
        assert!(permission_grants("*:*", "report:export"));
        assert!(permission_grants("report:*", "report:export"));
        assert!(permission_grants("*:export", "report:export"));
        assert!(permission_grants("report:export", "report:export"));

        assert!(!permission_grants("report:*", "inventory:export"));
        assert!(!permission_grants("*:read", "report:export"));
        assert!(!permission_grants("report:read", "report:export"));
        assert!(!permission_grants("rep*:export", "report:export"));
        assert!(!permission_grants("report", "report:export"));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let code = PermissionCode::new(PermissionModule::Project, PermissionAction::Manage);
        let json = serde_json::to_string(&code).unwrap_or_default();
        assert_eq!(json, "\"project:manage\"");
    }

    proptest! {
        #[test]
        fn module_wildcard_covers_any_action(module in "[a-z]{1,12}", action in "[a-z_]{1,12}") {
            let held = format!("{module}:*");
            let required = format!("{module}:{action}");
            prop_assert!(permission_grants(&held, &required));
        }

        #[test]
        fn action_wildcard_never_crosses_actions(
            module in "[a-z]{1,12}",
            action in "[a-z]{1,12}",
            other in "[a-z]{1,12}",
        ) {
            prop_assume!(action != other);
            let held = format!("*:{action}");
            let required = format!("{module}:{other}");
            prop_assert!(!permission_grants(&held, &required));
        }

        #[test]
        fn concrete_codes_only_grant_themselves(
            left in 0usize..9, right in 0usize..9, left_action in 0usize..9, right_action in 0usize..9,
        ) {
            let held = PermissionCode::new(PermissionModule::all()[left], PermissionAction::all()[left_action]);
            let required = PermissionCode::new(PermissionModule::all()[right], PermissionAction::all()[right_action]);
            prop_assert_eq!(
                permission_grants(&held.to_string(), &required.to_string()),
                held == required
            );
        }
    }
}
