//! HS256 session tokens.

use castellan_application::{IssuedSession, SessionClaims, SessionTokenCodec};
use castellan_core::{AppError, AppResult};
use castellan_domain::UserId;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted session lifetime, in seconds (366 days).
pub const MAX_SESSION_TTL_SECONDS: i64 = 366 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    name: String,
    jti: String,
    iat: i64,
    /// Issue time in microseconds; `iat` alone cannot order a token against a revocation
    /// written earlier in the same second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat_micros: Option<i64>,
    exp: i64,
    iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct JwtSessionTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for JwtSessionTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionTokenCodec")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl JwtSessionTokenCodec {
    /// Creates a codec. The secret must be at least [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> AppResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "session signing secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if ttl <= Duration::zero() {
            return Err(AppError::Validation(
                "session lifetime must be positive".to_owned(),
            ));
        }
        if ttl.num_seconds() > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::Validation(format!(
                "session lifetime must not exceed {MAX_SESSION_TTL_SECONDS} seconds"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        })
    }
}

impl SessionTokenCodec for JwtSessionTokenCodec {
    fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Option<String>,
        permissions: Vec<String>,
    ) -> AppResult<IssuedSession> {
        let issued_at = Utc::now().trunc_subsecs(6);
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("session expiry is out of range".to_owned()))?;
        let claims = TokenClaims {
            sub: user_id.as_uuid(),
            name: username.to_owned(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            iat_micros: Some(issued_at.timestamp_micros()),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            role,
            permissions,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign session token: {error}")))?;
        debug!(user_id = %user_id, jti = %claims.jti, "issued session token");

        Ok(IssuedSession {
            token,
            claims: session_claims(claims)?,
        })
    }

    fn decode(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|error| {
            debug!(error = %error, "session token rejected");
            AppError::Unauthorized("invalid session token".to_owned())
        })?;

        session_claims(data.claims)
    }
}

fn session_claims(claims: TokenClaims) -> AppResult<SessionClaims> {
    let issued_at = issued_at(&claims)?;
    let expires_at = timestamp(claims.exp)?;

    Ok(SessionClaims {
        user_id: UserId::from_uuid(claims.sub),
        username: claims.name,
        token_id: claims.jti,
        issued_at,
        expires_at,
        role: claims.role,
        permissions: claims.permissions,
    })
}

fn issued_at(claims: &TokenClaims) -> AppResult<DateTime<Utc>> {
    match claims.iat_micros {
        Some(micros) if micros.div_euclid(1_000_000) == claims.iat => {
            DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| AppError::Unauthorized("invalid session token".to_owned()))
        }
        Some(_) => Err(AppError::Unauthorized("invalid session token".to_owned())),
        None => timestamp(claims.iat),
    }
}

fn timestamp(seconds: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| AppError::Unauthorized("invalid session token".to_owned()))
}
