use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use castellan_core::AppError;
use castellan_infrastructure::{MAX_SESSION_TTL_SECONDS, MIN_SECRET_LENGTH};
use tracing_subscriber::EnvFilter;

/// Where the access store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Process-local store, lost on restart.
    Memory,
    /// Postgres behind `DATABASE_URL`.
    Postgres { database_url: String },
}

/// Account seeded with full administrative access at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdminConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdminConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BootstrapAdminConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage: StorageConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_seconds: i64,
    pub legacy_matrix_enabled: bool,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiConfig")
            .field("migrate_only", &self.migrate_only)
            .field("storage", &self.storage_label())
            .field("frontend_url", &self.frontend_url)
            .field("api_host", &self.api_host)
            .field("api_port", &self.api_port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_ttl_seconds", &self.jwt_ttl_seconds)
            .field("legacy_matrix_enabled", &self.legacy_matrix_enabled)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let first_argument = env::args().nth(1);
        Self::from_lookup(first_argument.as_deref(), |name| env::var(name).ok())
    }

    pub fn from_lookup(
        first_argument: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let migrate_only = first_argument == Some("migrate");

        let storage = match non_empty(&lookup, "DATABASE_URL") {
            Some(database_url) => StorageConfig::Postgres { database_url },
            None if migrate_only => {
                return Err(AppError::Validation(
                    "DATABASE_URL is required for migrate".to_owned(),
                ));
            }
            None => StorageConfig::Memory,
        };

        let frontend_url = non_empty(&lookup, "FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_owned());
        let api_host = non_empty(&lookup, "API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or(&lookup, "API_PORT", 3001_u16)?;

        let jwt_secret = non_empty(&lookup, "JWT_SECRET")
            .ok_or_else(|| AppError::Validation("JWT_SECRET is required".to_owned()))?;
        if jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LENGTH} characters"
            )));
        }
        let jwt_issuer = non_empty(&lookup, "JWT_ISSUER").unwrap_or_else(|| "castellan".to_owned());
        let jwt_ttl_seconds = parse_or(&lookup, "JWT_TTL_SECONDS", 3600_i64)?;
        if jwt_ttl_seconds <= 0 {
            return Err(AppError::Validation(
                "JWT_TTL_SECONDS must be positive".to_owned(),
            ));
        }
        if jwt_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::Validation(format!(
                "JWT_TTL_SECONDS must not exceed {MAX_SESSION_TTL_SECONDS}"
            )));
        }

        let legacy_matrix_enabled = match non_empty(&lookup, "LEGACY_PERMISSION_MATRIX")
            .unwrap_or_else(|| "enabled".to_owned())
            .to_ascii_lowercase()
            .as_str()
        {
            "enabled" => true,
            "disabled" => false,
            other => {
                return Err(AppError::Validation(format!(
                    "LEGACY_PERMISSION_MATRIX must be either 'enabled' or 'disabled', got '{other}'"
                )));
            }
        };

        let bootstrap_admin = match (
            non_empty(&lookup, "BOOTSTRAP_ADMIN_USERNAME"),
            non_empty(&lookup, "BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdminConfig { username, password }),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"
                        .to_owned(),
                ));
            }
        };

        Ok(Self {
            migrate_only,
            storage,
            frontend_url,
            api_host,
            api_port,
            jwt_secret,
            jwt_issuer,
            jwt_ttl_seconds,
            legacy_matrix_enabled,
            bootstrap_admin,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    pub fn storage_label(&self) -> &'static str {
        match self.storage {
            StorageConfig::Memory => "memory",
            StorageConfig::Postgres { .. } => "postgres",
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T::Err: fmt::Display,
{
    match non_empty(lookup, name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}
