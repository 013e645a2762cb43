use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castellan_core::{AppError, ConstraintViolation};
use serde::Serialize;
use tracing::error;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) | AppError::Constraint(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn payload(&self) -> ErrorResponse {
        let (message, code) = match &self.0 {
            AppError::Unauthorized(_) => ("authentication required".to_owned(), None),
            AppError::Forbidden(_) => ("insufficient permissions".to_owned(), None),
            AppError::Internal(_) => ("internal server error".to_owned(), None),
            AppError::Constraint(violation) => {
                (self.0.to_string(), Some(constraint_code(violation)))
            }
            other => (other.to_string(), None),
        };

        ErrorResponse { message, code }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self.0 {
            error!(detail = %detail, "request failed with internal error");
        }

        (self.status(), Json(self.payload())).into_response()
    }
}

/// Stable machine-readable name of a constraint violation.
fn constraint_code(violation: &ConstraintViolation) -> &'static str {
    match violation {
        ConstraintViolation::SelfParent => "self_parent",
        ConstraintViolation::CircularReference => "circular_reference",
        ConstraintViolation::DepthExceeded { .. } => "depth_exceeded",
        ConstraintViolation::HasChildren => "has_children",
        ConstraintViolation::InUseAsPrimary { .. } => "in_use_as_primary",
        ConstraintViolation::InUseAsGrant { .. } => "in_use_as_grant",
        ConstraintViolation::DuplicateActiveGrant => "duplicate_active_grant",
        ConstraintViolation::NoActiveGrant => "no_active_grant",
        ConstraintViolation::SystemReserved(_) => "system_reserved",
        ConstraintViolation::PermissionInUse { .. } => "permission_in_use",
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
