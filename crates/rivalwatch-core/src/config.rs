use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::{default_worker_pool_size, AppConfig, Environment};
use crate::crawl::IsolationStrategy;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_num(var, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        usize::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let env = parse_environment(&or_default("RIVALWATCH_ENV", "development"))?;
    let log_level = or_default("RIVALWATCH_LOG_LEVEL", "info");
    let competitors_path = PathBuf::from(or_default(
        "RIVALWATCH_COMPETITORS_PATH",
        "./config/competitors.yaml",
    ));

    let db_max_connections = parse_u32("RIVALWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("RIVALWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_num("RIVALWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let crawl_timeout_secs = parse_num("RIVALWATCH_CRAWL_TIMEOUT_SECS", "30")?;
    let crawl_user_agent = or_default(
        "RIVALWATCH_CRAWL_USER_AGENT",
        "rivalwatch/0.1 (automated competitor monitor)",
    );
    let crawl_max_concurrent = parse_positive("RIVALWATCH_CRAWL_MAX_CONCURRENT", "3")?;
    let strategy_raw = or_default("RIVALWATCH_CRAWL_STRATEGY", "process-adaptive");
    let crawl_strategy =
        IsolationStrategy::from_str(&strategy_raw).map_err(|e| ConfigError::InvalidEnvVar {
            var: "RIVALWATCH_CRAWL_STRATEGY".to_string(),
            reason: e.to_string(),
        })?;

    let default_pool = default_worker_pool_size().to_string();
    let worker_pool_size = parse_positive("RIVALWATCH_WORKER_POOL_SIZE", &default_pool)?;
    let worker_bin = lookup("RIVALWATCH_WORKER_BIN").ok().map(PathBuf::from);
    let worker_timeout_secs = parse_num("RIVALWATCH_WORKER_TIMEOUT_SECS", "300")?;
    let batch_size = parse_positive("RIVALWATCH_BATCH_SIZE", "2")?;
    let batch_delay_ms = parse_num("RIVALWATCH_BATCH_DELAY_MS", "500")?;
    let content_max_chars = parse_positive("RIVALWATCH_CONTENT_MAX_CHARS", "10000")?;

    let extraction_base_url = or_default(
        "RIVALWATCH_EXTRACTION_BASE_URL",
        "https://api.openai.com/v1",
    );
    let extraction_timeout_secs = parse_num("RIVALWATCH_EXTRACTION_TIMEOUT_SECS", "60")?;
    let openai_api_key = lookup("OPENAI_API_KEY").ok().filter(|v| !v.is_empty());

    let scan_max_backoff_minutes = parse_num("RIVALWATCH_SCAN_MAX_BACKOFF_MINUTES", "1440")?;
    let stale_scan_minutes = parse_num("RIVALWATCH_STALE_SCAN_MINUTES", "120")?;
    let max_concurrent_scans = parse_positive("RIVALWATCH_MAX_CONCURRENT_SCANS", "2")?;
    let scheduler_cron = or_default("RIVALWATCH_SCHEDULER_CRON", "0 */5 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        competitors_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        crawl_timeout_secs,
        crawl_user_agent,
        crawl_max_concurrent,
        crawl_strategy,
        worker_pool_size,
        worker_bin,
        worker_timeout_secs,
        batch_size,
        batch_delay_ms,
        content_max_chars,
        extraction_base_url,
        extraction_timeout_secs,
        openai_api_key,
        scan_max_backoff_minutes,
        stale_scan_minutes,
        max_concurrent_scans,
        scheduler_cron,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RIVALWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
