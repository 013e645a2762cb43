use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use castellan_application::AssignRoleInput;
use castellan_core::{AppResult, UserIdentity};
use castellan_domain::{GrantAmendment, GrantPriority, RoleId, UserId};
use uuid::Uuid;

use crate::dto::{
    AssignRoleRequest, GrantResponse, ListUserRolesQuery, RevokeRoleQuery, UpdateRoleGrantRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_user_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListUserRolesQuery>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let grants = state
        .security_admin_service
        .list_user_roles(&user, UserId::from_uuid(user_id), query.active_only)
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    let input = AssignRoleInput {
        user_id: UserId::from_uuid(user_id),
        role_id: RoleId::from_uuid(payload.role_id),
        valid_from: payload.valid_from,
        valid_to: payload.valid_to,
        priority: priority_or_default(payload.priority)?,
        assigned_by: None,
        reason: payload.reason,
    };
    let grant = state.security_admin_service.assign_role(&user, input).await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

pub async fn update_role_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateRoleGrantRequest>,
) -> ApiResult<Json<GrantResponse>> {
    let amendment = GrantAmendment {
        priority: payload.priority.map(GrantPriority::new).transpose()?,
        valid_to: payload.valid_to,
        updated_by: None,
        reason: payload.reason,
    };
    let grant = state
        .security_admin_service
        .update_role_grant(
            &user,
            UserId::from_uuid(user_id),
            RoleId::from_uuid(role_id),
            amendment,
        )
        .await?;

    Ok(Json(GrantResponse::from(grant)))
}

pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RevokeRoleQuery>,
) -> ApiResult<Json<GrantResponse>> {
    let grant = state
        .security_admin_service
        .revoke_role(
            &user,
            UserId::from_uuid(user_id),
            RoleId::from_uuid(role_id),
            query.reason,
        )
        .await?;

    Ok(Json(GrantResponse::from(grant)))
}

fn priority_or_default(value: Option<i32>) -> AppResult<GrantPriority> {
    value.map_or(Ok(GrantPriority::DEFAULT), GrantPriority::new)
}
