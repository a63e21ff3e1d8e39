use crate::app_config::{AppConfig, Environment};
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
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

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

    let airtable_api_key = require("AIRTABLE_API_KEY")?;
    let airtable_base_id = require("AIRTABLE_BASE_ID")?;
    let supabase_url = require("SUPABASE_URL")?;
    let supabase_service_key = require("SUPABASE_SERVICE_KEY")?;

    let raw_number = require("ROSSO_WHATSAPP_NUMBER")?;
    let whatsapp_number: String = raw_number.chars().filter(char::is_ascii_digit).collect();
    if whatsapp_number.is_empty() {
        return Err(invalid(
            "ROSSO_WHATSAPP_NUMBER",
            format!("'{raw_number}' contains no digits"),
        ));
    }

    let env = parse_environment(&or_default("ROSSO_ENV", "development"))?;

    let bind_addr = or_default("ROSSO_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("ROSSO_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("ROSSO_LOG_LEVEL", "info");

    let airtable_api_url = or_default("AIRTABLE_API_URL", "https://api.airtable.com/v0");
    let airtable_products_table = or_default("AIRTABLE_PRODUCTS_TABLE", "Products");
    let airtable_categories_table = or_default("AIRTABLE_CATEGORIES_TABLE", "Categories");
    let airtable_brands_table = or_default("AIRTABLE_BRANDS_TABLE", "Brands");
    let supabase_users_table = or_default("SUPABASE_USERS_TABLE", "users");

    let http_timeout_secs = parse_u64("ROSSO_HTTP_TIMEOUT_SECS", "30")?;
    let http_max_retries = parse_u32("ROSSO_HTTP_MAX_RETRIES", "3")?;
    let http_retry_backoff_ms = parse_u64("ROSSO_HTTP_RETRY_BACKOFF_MS", "500")?;
    let session_ttl_secs = parse_u64("ROSSO_SESSION_TTL_SECS", "86400")?;
    let cart_ttl_secs = parse_u64("ROSSO_CART_TTL_SECS", "604800")?;
    let max_carts = or_default("ROSSO_MAX_CARTS", "10000")
        .parse::<usize>()
        .map_err(|e| invalid("ROSSO_MAX_CARTS", e.to_string()))?;
    let low_stock_threshold = or_default("ROSSO_LOW_STOCK_THRESHOLD", "5")
        .parse::<i64>()
        .map_err(|e| invalid("ROSSO_LOW_STOCK_THRESHOLD", e.to_string()))?;

    if session_ttl_secs == 0 {
        return Err(invalid("ROSSO_SESSION_TTL_SECS", "must be positive".into()));
    }
    if max_carts == 0 {
        return Err(invalid("ROSSO_MAX_CARTS", "must be positive".into()));
    }

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        airtable_api_url,
        airtable_api_key,
        airtable_base_id,
        airtable_products_table,
        airtable_categories_table,
        airtable_brands_table,
        supabase_url,
        supabase_service_key,
        supabase_users_table,
        whatsapp_number,
        http_timeout_secs,
        http_max_retries,
        http_retry_backoff_ms,
        session_ttl_secs,
        cart_ttl_secs,
        max_carts,
        low_stock_threshold,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ROSSO_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
