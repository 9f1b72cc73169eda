use crate::app_config::{AppConfig, Environment, PlatformCredentials};
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

/// Load application configuration from the variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank credentials are treated the same as absent ones.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("TRENDSCOPE_ENV", "development"))?;
    let log_level = or_default("TRENDSCOPE_LOG_LEVEL", "info");
    let collectors_path = PathBuf::from(or_default(
        "TRENDSCOPE_COLLECTORS_PATH",
        "./config/collectors.yaml",
    ));

    let credentials = PlatformCredentials {
        youtube_api_key: optional("YOUTUBE_API_KEY"),
        tiktok_client_key: optional("TIKTOK_CLIENT_KEY"),
        tiktok_client_secret: optional("TIKTOK_CLIENT_SECRET"),
        instagram_access_token: optional("INSTAGRAM_ACCESS_TOKEN"),
        twitter_bearer_token: optional("TWITTER_BEARER_TOKEN"),
        linkedin_access_token: optional("LINKEDIN_ACCESS_TOKEN"),
    };

    let db_max_connections = parse_u32("TRENDSCOPE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRENDSCOPE_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "TRENDSCOPE_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs = parse_u64("TRENDSCOPE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("TRENDSCOPE_HTTP_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default(
        "TRENDSCOPE_HTTP_USER_AGENT",
        "trendscope/0.1 (trend-collection)",
    );
    let http_max_retries = parse_u32("TRENDSCOPE_HTTP_MAX_RETRIES", "3")?;
    let http_backoff_base_ms = parse_u64("TRENDSCOPE_HTTP_BACKOFF_BASE_MS", "1000")?;
    let cache_ttl_secs = parse_u64("TRENDSCOPE_CACHE_TTL_SECS", "3600")?;
    let adapter_timeout_secs = parse_u64("TRENDSCOPE_ADAPTER_TIMEOUT_SECS", "120")?;
    if adapter_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TRENDSCOPE_ADAPTER_TIMEOUT_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let retention_days = parse_u32("TRENDSCOPE_RETENTION_DAYS", "30")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        collectors_path,
        credentials,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_user_agent,
        http_max_retries,
        http_backoff_base_ms,
        cache_ttl_secs,
        adapter_timeout_secs,
        retention_days,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TRENDSCOPE_ENV".to_string(),
            reason: format!("unknown environment '{other}'; expected development, test, or production"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
