use crate::app_config::AppConfig;
use crate::staging::RawPayloadMode;
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
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup with no `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let tray_url = require("TRAY_URL")?;
    if !is_http_url(&tray_url) {
        return Err(invalid(
            "TRAY_URL",
            format!("\"{tray_url}\" is not an http(s) URL"),
        ));
    }
    let tray_token = require("TRAY_TOKEN")?;
    let tray_extra_query = parse_extra_query(&or_default("TRAY_EXTRA_QUERY", ""))
        .map_err(|reason| invalid("TRAY_EXTRA_QUERY", reason))?;
    let webhook_url = lookup("TRAYSYNC_WEBHOOK_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let log_level = or_default("TRAYSYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("TRAYSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRAYSYNC_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "TRAYSYNC_DB_MIN_CONNECTIONS",
            format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("TRAYSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let request_timeout_secs = parse_u64("TRAYSYNC_REQUEST_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("TRAYSYNC_USER_AGENT", "traysync/0.1 (catalog-sync)");

    let rate_budget = parse_u32("TRAYSYNC_RATE_BUDGET", "120")?;
    if rate_budget == 0 {
        return Err(invalid("TRAYSYNC_RATE_BUDGET", "must be at least 1".into()));
    }
    let rate_window_ms = parse_u64("TRAYSYNC_RATE_WINDOW_MS", "60000")?;
    if rate_window_ms == 0 {
        return Err(invalid("TRAYSYNC_RATE_WINDOW_MS", "must be at least 1".into()));
    }

    let max_retries = parse_u32("TRAYSYNC_MAX_RETRIES", "5")?;
    let backoff_base_secs = parse_u64("TRAYSYNC_BACKOFF_BASE_SECS", "5")?;
    let backoff_cap_secs = parse_u64("TRAYSYNC_BACKOFF_CAP_SECS", "60")?;

    let batch_size = parse_usize("TRAYSYNC_BATCH_SIZE", "1000")?;
    if batch_size == 0 {
        return Err(invalid("TRAYSYNC_BATCH_SIZE", "must be at least 1".into()));
    }

    let raw_payload = or_default("TRAYSYNC_RAW_PAYLOAD", "minimal")
        .parse::<RawPayloadMode>()
        .map_err(|reason| invalid("TRAYSYNC_RAW_PAYLOAD", reason))?;

    let cron = or_default("TRAYSYNC_CRON", "0 */5 * * * *");

    Ok(AppConfig {
        database_url,
        log_level,
        tray_url,
        tray_token,
        tray_extra_query,
        webhook_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        user_agent,
        rate_budget,
        rate_window_ms,
        max_retries,
        backoff_base_secs,
        backoff_cap_secs,
        batch_size,
        raw_payload,
        cron,
    })
}

/// Splits `a=1&b=2` into ordered pairs. Empty input yields no pairs.
fn parse_extra_query(raw: &str) -> Result<Vec<(String, String)>, String> {
    raw.split('&')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => Err(format!("\"{pair}\" is not a key=value pair")),
        })
        .collect()
}

/// Structural check only; the catalog client does the full URL parse.
fn is_http_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.trim_matches('/').is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
