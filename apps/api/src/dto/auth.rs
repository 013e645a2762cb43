use castellan_application::{AuthenticatedSession, IssuedSession};
use serde::{Deserialize, Serialize};

/// Incoming payload for username/password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Signed bearer token and the claims it carries.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: String,
    pub session: SessionResponse,
}

/// Incoming payload for a password change by the account owner.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub username: String,
    pub role: Option<String>,
    pub permissions: Vec<String>,
}

impl From<IssuedSession> for LoginResponse {
    fn from(value: IssuedSession) -> Self {
        let claims = value.claims;
        Self {
            access_token: value.token,
            token_type: "Bearer",
            expires_at: claims.expires_at.to_rfc3339(),
            session: SessionResponse {
                user_id: claims.user_id.to_string(),
                username: claims.username,
                role: claims.role,
                permissions: claims.permissions,
            },
        }
    }
}

impl From<AuthenticatedSession> for SessionResponse {
    fn from(value: AuthenticatedSession) -> Self {
        Self {
            user_id: value.identity.user_id().to_string(),
            username: value.identity.username().to_owned(),
            role: value.role,
            permissions: value.permissions.into_iter().collect(),
        }
    }
}
