use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use castellan_application::PermissionInput;
use castellan_core::{AppResult, NonEmptyString, UserIdentity};
use castellan_domain::{PermissionCode, PermissionId};
use uuid::Uuid;

use crate::dto::{PermissionMatrixResponse, PermissionRequest, PermissionResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state
        .security_admin_service
        .list_permissions(&user)
        .await?
        .into_iter()
        .map(PermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}

pub async fn permission_matrix_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<PermissionMatrixResponse>> {
    let matrix = state.security_admin_service.permission_matrix(&user).await?;
    Ok(Json(PermissionMatrixResponse::from(matrix)))
}

pub async fn create_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<PermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = state
        .security_admin_service
        .create_permission(&user, permission_input(payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

pub async fn update_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(permission_id): Path<Uuid>,
    Json(payload): Json<PermissionRequest>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = state
        .security_admin_service
        .update_permission(
            &user,
            PermissionId::from_uuid(permission_id),
            permission_input(payload)?,
        )
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}

pub async fn delete_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .delete_permission(&user, PermissionId::from_uuid(permission_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn permission_input(payload: PermissionRequest) -> AppResult<PermissionInput> {
    let code = PermissionCode::parse(payload.code.as_str())?;
    let display_name = match payload.display_name {
        Some(display_name) => NonEmptyString::new(display_name)?,
        None => NonEmptyString::new(code.default_display_name())?,
    };

    Ok(PermissionInput {
        code,
        display_name,
        description: payload.description,
    })
}
