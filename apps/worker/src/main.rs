//! Castellan housekeeping worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use castellan_application::{HousekeepingService, RoleAssignmentLedger, TokenRevocationRegistry};
use castellan_core::{AppError, AppResult};
use castellan_infrastructure::{
    MAX_SESSION_TTL_SECONDS, PostgresAuditRepository, PostgresRevokedTokenRepository,
    PostgresRoleRepository, PostgresUserRepository, PostgresUserRoleRepository,
};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Longest accepted marker retention (ten years).
const MAX_TOKEN_RETENTION_HOURS: i64 = 10 * 366 * 24;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    grant_sweep_interval_seconds: u64,
    token_prune_interval_seconds: u64,
    token_retention: chrono::Duration,
    session_lifetime: chrono::Duration,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let housekeeping =
        build_housekeeping_service(pool, config.token_retention, config.session_lifetime);

    info!(
        grant_sweep_interval_seconds = config.grant_sweep_interval_seconds,
        token_prune_interval_seconds = config.token_prune_interval_seconds,
        marker_retention_hours = housekeeping.marker_retention().num_hours(),
        "castellan worker started"
    );

    let mut grant_sweep = tokio::time::interval(Duration::from_secs(
        config.grant_sweep_interval_seconds,
    ));
    grant_sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut token_prune = tokio::time::interval(Duration::from_secs(
        config.token_prune_interval_seconds,
    ));
    token_prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = grant_sweep.tick() => {
                match housekeeping.sweep_expired_grants().await {
                    Ok(0) => {}
                    Ok(expired_grants) => {
                        info!(expired_grants, "expired role grants swept");
                    }
                    Err(error) => {
                        warn!(error = %error, "failed to sweep expired role grants");
                    }
                }
            }
            _ = token_prune.tick() => {
                match housekeeping.prune_markers(Utc::now()).await {
                    Ok(0) => {}
                    Ok(pruned_markers) => {
                        info!(pruned_markers, "revocation markers pruned");
                    }
                    Err(error) => {
                        warn!(error = %error, "failed to prune revocation markers");
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                info!("castellan worker stopping");
                return Ok(());
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_housekeeping_service(
    pool: PgPool,
    token_retention: chrono::Duration,
    session_lifetime: chrono::Duration,
) -> HousekeepingService {
    let ledger = RoleAssignmentLedger::new(
        Arc::new(PostgresUserRoleRepository::new(pool.clone())),
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(PostgresRoleRepository::new(pool.clone())),
    );
    let revocations =
        TokenRevocationRegistry::new(Arc::new(PostgresRevokedTokenRepository::new(pool.clone())));

    HousekeepingService::new(
        ledger,
        revocations,
        Arc::new(PostgresAuditRepository::new(pool)),
        token_retention,
        session_lifetime,
    )
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let grant_sweep_interval_seconds =
            parse_positive(&lookup, "GRANT_SWEEP_INTERVAL_SECONDS", 300_u64)?;
        let token_prune_interval_seconds =
            parse_positive(&lookup, "TOKEN_PRUNE_INTERVAL_SECONDS", 3600_u64)?;
        let token_retention_hours = parse_positive(&lookup, "TOKEN_RETENTION_HOURS", 168_i64)?;
        if token_retention_hours > MAX_TOKEN_RETENTION_HOURS {
            return Err(AppError::Validation(format!(
                "TOKEN_RETENTION_HOURS must not exceed {MAX_TOKEN_RETENTION_HOURS}"
            )));
        }
        let jwt_ttl_seconds = parse_positive(&lookup, "JWT_TTL_SECONDS", 3600_i64)?;
        if jwt_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::Validation(format!(
                "JWT_TTL_SECONDS must not exceed {MAX_SESSION_TTL_SECONDS}"
            )));
        }

        Ok(Self {
            database_url,
            grant_sweep_interval_seconds,
            token_prune_interval_seconds,
            token_retention: chrono::Duration::try_hours(token_retention_hours).ok_or_else(
                || AppError::Validation("TOKEN_RETENTION_HOURS is out of range".to_owned()),
            )?,
            session_lifetime: chrono::Duration::try_seconds(jwt_ttl_seconds).ok_or_else(|| {
                AppError::Validation("JWT_TTL_SECONDS is out of range".to_owned())
            })?,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> AppResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if value <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}
