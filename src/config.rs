use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUDGETS_RATE_LIMIT, DEFAULT_CACHE_TTL_SECS, DEFAULT_CATEGORIES_RATE_LIMIT,
    DEFAULT_EXPENSES_RATE_LIMIT, DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_TOKEN_TTL_SECS,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// `postgres://...` for PostgreSQL, `memory://` for the in-process store
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    /// Key used to digest bearer tokens before they are stored
    pub app_secret_key: String,
    pub token_ttl_secs: u64,
    pub cache_ttl_secs: u64,
    pub rate_limit_window_secs: u64,
    pub expenses_rate_limit: u32,
    pub categories_rate_limit: u32,
    pub budgets_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_var("SERVER_PORT", 8080)?;

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let app_secret_key = env::var("APP_SECRET_KEY")
            .map_err(|_| "APP_SECRET_KEY must be set for token signing")?;

        Ok(Config {
            server_host,
            server_port,
            database_url,
            allowed_origins,
            environment,
            app_secret_key,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            rate_limit_window_secs: parse_var(
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?,
            expenses_rate_limit: parse_var("EXPENSES_RATE_LIMIT", DEFAULT_EXPENSES_RATE_LIMIT)?,
            categories_rate_limit: parse_var(
                "CATEGORIES_RATE_LIMIT",
                DEFAULT_CATEGORIES_RATE_LIMIT,
            )?,
            budgets_rate_limit: parse_var("BUDGETS_RATE_LIMIT", DEFAULT_BUDGETS_RATE_LIMIT)?,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

/// Read a numeric variable, falling back to `default` when it is unset
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}
