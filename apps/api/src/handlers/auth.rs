use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use castellan_application::AuthenticatedSession;
use castellan_core::UserIdentity;
use tracing::info;

use crate::dto::{ChangePasswordRequest, LoginRequest, LoginResponse, SessionResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = state
        .session_service
        .login(payload.username.as_str(), payload.password.as_str())
        .await?;

    info!(user_id = %session.claims.user_id, "session issued");
    Ok(Json(LoginResponse::from(session)))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<StatusCode> {
    state.session_service.logout(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me_handler(
    Extension(session): Extension<AuthenticatedSession>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse::from(session)))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .session_service
        .change_password(
            &user,
            payload.current_password.as_str(),
            payload.new_password.as_str(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
