use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use castellan_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Validates the bearer token and attaches the session and identity to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?
        .to_owned();

    let session = state.session_service.authenticate(&token).await?;

    request.extensions_mut().insert(session.identity.clone());
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
