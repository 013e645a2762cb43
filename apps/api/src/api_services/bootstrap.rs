use castellan_application::{AssignRoleInput, CreateRoleInput, PermissionInput, UserAccount};
use castellan_core::{AppResult, NonEmptyString};
use castellan_domain::{GrantPriority, PermissionCode, Role, UserId, validate_password};
use tracing::info;

use crate::api_config::BootstrapAdminConfig;

use super::EngineServices;

/// Role created for the bootstrap administrator. Also keyed in the legacy matrix.
const BOOTSTRAP_ROLE_NAME: &str = "super_admin";

const FULL_ACCESS_CODE: &str = "*:*";

/// Creates the configured administrator unless an account with that name already exists.
pub async fn seed_bootstrap_admin(
    engine: &EngineServices,
    admin: &BootstrapAdminConfig,
) -> AppResult<Option<UserId>> {
    if engine
        .users
        .find_user_by_username(admin.username.as_str())
        .await?
        .is_some()
    {
        info!(username = %admin.username, "bootstrap administrator already present");
        return Ok(None);
    }

    validate_password(admin.password.as_str())?;
    let role = administrator_role(engine).await?;

    let user_id = UserId::new();
    engine
        .users
        .create_user(UserAccount {
            id: user_id,
            username: admin.username.clone(),
            email: format!("{}@castellan.local", admin.username.to_lowercase()),
            password_hash: engine.password_hasher.hash_password(admin.password.as_str())?,
            is_active: true,
            primary_role_id: None,
            department_id: None,
        })
        .await?;

    engine
        .ledger
        .assign(AssignRoleInput {
            user_id,
            role_id: role.id(),
            valid_from: None,
            valid_to: None,
            priority: GrantPriority::DEFAULT,
            assigned_by: None,
            reason: Some("bootstrap administrator".to_owned()),
        })
        .await?;

    info!(user_id = %user_id, username = %admin.username, "bootstrap administrator created");
    Ok(Some(user_id))
}

async fn administrator_role(engine: &EngineServices) -> AppResult<Role> {
    if let Some(role) = engine
        .roles
        .list_roles()
        .await?
        .into_iter()
        .find(|role| role.name().as_str().eq_ignore_ascii_case(BOOTSTRAP_ROLE_NAME))
    {
        return Ok(role);
    }

    let full_access = PermissionCode::parse(FULL_ACCESS_CODE)?;
    let permission = match engine
        .catalog
        .list_permissions()
        .await?
        .into_iter()
        .find(|permission| permission.code() == full_access)
    {
        Some(permission) => permission,
        None => {
            engine
                .catalog
                .create_permission(PermissionInput {
                    code: full_access,
                    display_name: NonEmptyString::new("Full access")?,
                    description: Some("Every action on every module".to_owned()),
                })
                .await?
        }
    };

    engine
        .roles
        .create_role(CreateRoleInput {
            name: NonEmptyString::new(BOOTSTRAP_ROLE_NAME)?,
            display_name: NonEmptyString::new("Super administrator")?,
            description: Some("Seeded at startup".to_owned()),
            parent_id: None,
            permission_ids: vec![permission.id()],
        })
        .await
}
