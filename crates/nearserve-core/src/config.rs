use crate::app_config::{AppConfig, Environment};
use crate::bookings::TransitionPolicy;
use crate::geo::{Coordinates, DEFAULT_ORIGIN};
use crate::ranking::DEFAULT_RADIUS_KM;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f64 = |var: &str, default: f64| -> Result<f64, ConfigError> {
        match lookup(var) {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|e| invalid(var, e.to_string())),
            Err(_) => Ok(default),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("NEARSERVE_ENV", "development"))?;

    let bind_addr = parse_addr("NEARSERVE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("NEARSERVE_LOG_LEVEL", "info");
    let seed_path = PathBuf::from(or_default(
        "NEARSERVE_SEED_PATH",
        "./config/providers.yaml",
    ));

    let default_origin = Coordinates::new(
        parse_f64("NEARSERVE_DEFAULT_LAT", DEFAULT_ORIGIN.latitude)?,
        parse_f64("NEARSERVE_DEFAULT_LNG", DEFAULT_ORIGIN.longitude)?,
    );
    default_origin
        .validate()
        .map_err(|e| invalid("NEARSERVE_DEFAULT_LAT/NEARSERVE_DEFAULT_LNG", e.to_string()))?;

    let default_radius_km = parse_f64("NEARSERVE_DEFAULT_RADIUS_KM", DEFAULT_RADIUS_KM)?;
    if !default_radius_km.is_finite() || default_radius_km <= 0.0 {
        return Err(invalid(
            "NEARSERVE_DEFAULT_RADIUS_KM",
            format!("must be a positive number, got {default_radius_km}"),
        ));
    }

    let booking_transitions = or_default("NEARSERVE_BOOKING_TRANSITIONS", "permissive")
        .parse::<TransitionPolicy>()
        .map_err(|e| invalid("NEARSERVE_BOOKING_TRANSITIONS", e.to_string()))?;

    let db_max_connections = parse_u32("NEARSERVE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("NEARSERVE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("NEARSERVE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        seed_path,
        default_origin,
        default_radius_km,
        booking_transitions,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "NEARSERVE_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
