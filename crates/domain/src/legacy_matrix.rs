use std::collections::HashMap;

use castellan_core::AppResult;

use crate::permission::PermissionCode;

/// Base permissions granted by role name, on top of catalog assignments.
///
/// Keys are compared case-insensitively. An empty matrix disables the mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyPermissionMatrix {
    entries: HashMap<String, Vec<PermissionCode>>,
}

impl LegacyPermissionMatrix {
    /// A matrix that grants nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The built-in matrix for the four historical role names.
    pub fn standard() -> AppResult<Self> {
        Self::disabled()
            .with_role("super_admin", &["*:*"])?
            .with_role(
                "admin",
                &[
                    "user:*",
                    "department:*",
                    "role:*",
                    "permission:read",
                    "permission:list",
                    "audit:read",
                    "report:*",
                ],
            )?
            .with_role(
                "manager",
                &[
                    "user:read",
                    "user:list",
                    "department:read",
                    "department:list",
                    "report:read",
                    "report:export",
                    "inventory:*",
                    "project:*",
                ],
            )?
            .with_role(
                "employee",
                &[
                    "user:read",
                    "department:read",
                    "inventory:read",
                    "project:read",
                ],
            )
    }

    /// Adds or replaces the entry for a role name.
    pub fn with_role(mut self, role_name: &str, permissions: &[&str]) -> AppResult<Self> {
        let codes = permissions
            .iter()
            .map(|permission| PermissionCode::parse(permission))
            .collect::<AppResult<Vec<_>>>()?;
        self.entries.insert(role_name.trim().to_lowercase(), codes);
        Ok(self)
    }

    /// Returns whether any entry is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Base permissions for a role name.
    #[must_use]
    pub fn permissions_for(&self, role_name: &str) -> &[PermissionCode] {
        self.entries
            .get(&role_name.trim().to_lowercase())
            .map_or(&[] as &[PermissionCode], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::LegacyPermissionMatrix;

    #[test]
    fn lookup_ignores_case() {
        let matrix = LegacyPermissionMatrix::standard().unwrap_or_default();
        let codes: Vec<String> = matrix
            .permissions_for("Manager")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(codes.contains(&"inventory:*".to_owned()));
        assert_eq!(
            matrix
                .permissions_for("SUPER_ADMIN")
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["*:*".to_owned()]
        );
    }

    #[test]
    fn disabled_matrix_grants_nothing() {
        let matrix = LegacyPermissionMatrix::disabled();
        assert!(!matrix.is_enabled());
        assert!(matrix.permissions_for("admin").is_empty());
    }

    #[test]
    fn invalid_entry_is_rejected() {
        assert!(
            LegacyPermissionMatrix::disabled()
                .with_role("auditor", &["audit:peek"])
                .is_err()
        );
    }
}
