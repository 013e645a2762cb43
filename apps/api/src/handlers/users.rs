use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use castellan_application::ScopeInput;
use castellan_core::UserIdentity;
use castellan_domain::UserId;
use uuid::Uuid;

use crate::dto::{
    AuthorizeRequest, AuthorizeResponse, EffectivePermissionsResponse, ReplaceScopesRequest,
    ScopeResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<AuthorizeRequest>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let subject = UserId::from_uuid(payload.user_id.unwrap_or_else(|| user.user_id()));
    let allowed = state
        .security_admin_service
        .check_authorization(
            &user,
            subject,
            payload.permission.as_str(),
            payload.resource_scope.as_ref(),
        )
        .await?;

    Ok(Json(AuthorizeResponse { allowed }))
}

pub async fn effective_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<EffectivePermissionsResponse>> {
    let effective = state
        .security_admin_service
        .effective_permissions(&user, UserId::from_uuid(user_id))
        .await?;

    Ok(Json(EffectivePermissionsResponse::from(effective)))
}

pub async fn list_user_scopes_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ScopeResponse>>> {
    let scopes = state
        .security_admin_service
        .user_scopes(&user, UserId::from_uuid(user_id))
        .await?
        .into_iter()
        .map(ScopeResponse::from)
        .collect();

    Ok(Json(scopes))
}

pub async fn replace_user_scopes_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ReplaceScopesRequest>,
) -> ApiResult<Json<Vec<ScopeResponse>>> {
    let inputs = payload
        .scopes
        .into_iter()
        .map(|scope| ScopeInput {
            permission: scope.permission,
            conditions: scope.conditions,
        })
        .collect();

    let scopes = state
        .security_admin_service
        .set_user_scopes(&user, UserId::from_uuid(user_id), inputs)
        .await?
        .into_iter()
        .map(ScopeResponse::from)
        .collect();

    Ok(Json(scopes))
}

pub async fn terminate_sessions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .terminate_sessions(&user, UserId::from_uuid(user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
