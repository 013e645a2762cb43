use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use castellan_application::{CreateRoleInput, RoleChanges};
use castellan_core::{AppResult, NonEmptyString, UserIdentity};
use castellan_domain::{PermissionId, RoleId};
use uuid::Uuid;

use crate::dto::{
    CreateRoleRequest, ResolvedPermissionResponse, RoleResponse, RoleTreeNodeResponse,
    UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .security_admin_service
        .list_roles(&user)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let input = create_role_input(payload)?;
    let role = state.security_admin_service.create_role(&user, input).await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn role_hierarchy_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleTreeNodeResponse>>> {
    let forest = state
        .security_admin_service
        .role_hierarchy(&user)
        .await?
        .into_iter()
        .map(RoleTreeNodeResponse::from)
        .collect();

    Ok(Json(forest))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .security_admin_service
        .find_role(&user, RoleId::from_uuid(role_id))
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let changes = role_changes(payload)?;
    let role = state
        .security_admin_service
        .update_role(&user, RoleId::from_uuid(role_id), changes)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .delete_role(&user, RoleId::from_uuid(role_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ResolvedPermissionResponse>>> {
    let permissions = state
        .security_admin_service
        .role_permissions(&user, RoleId::from_uuid(role_id))
        .await?
        .into_iter()
        .map(ResolvedPermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}

fn create_role_input(payload: CreateRoleRequest) -> AppResult<CreateRoleInput> {
    let display_name = payload
        .display_name
        .unwrap_or_else(|| payload.name.clone());

    Ok(CreateRoleInput {
        name: NonEmptyString::new(payload.name)?,
        display_name: NonEmptyString::new(display_name)?,
        description: payload.description,
        parent_id: payload.parent_id.map(RoleId::from_uuid),
        permission_ids: permission_ids(payload.permission_ids),
    })
}

fn role_changes(payload: UpdateRoleRequest) -> AppResult<RoleChanges> {
    Ok(RoleChanges {
        name: payload.name.map(NonEmptyString::new).transpose()?,
        display_name: payload.display_name.map(NonEmptyString::new).transpose()?,
        description: payload.description,
        parent_id: payload
            .parent_id
            .map(|parent_id| parent_id.map(RoleId::from_uuid)),
        permission_ids: payload.permission_ids.map(permission_ids),
    })
}

fn permission_ids(values: Vec<Uuid>) -> Vec<PermissionId> {
    values.into_iter().map(PermissionId::from_uuid).collect()
}
