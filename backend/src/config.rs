use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Server host
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Scans allowed per user per day
    pub daily_scan_limit: u32,

    /// Upstream pricing API settings
    pub keepa: KeepaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepaConfig {
    /// API key for the upstream pricing service
    pub api_key: String,

    /// Upstream product endpoint
    pub base_url: String,

    /// Upstream marketplace id (1 = amazon.com)
    pub domain: u32,

    /// Retention and stats window requested upstream, in days
    pub stats_days: i64,

    /// Bound on every upstream request
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: require("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1".to_string()),
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", "8080")?,
            daily_scan_limit: parse_var("DAILY_SCAN_LIMIT", "5")?,
            keepa: KeepaConfig {
                api_key: require("KEEPA_API_KEY")?,
                base_url: std::env::var("KEEPA_BASE_URL")
                    .unwrap_or_else(|_| "https://api.keepa.com/product".to_string()),
                domain: parse_var("KEEPA_DOMAIN", "1")?,
                stats_days: parse_var("KEEPA_STATS_DAYS", "180")?,
                request_timeout_secs: parse_var("KEEPA_TIMEOUT_SECS", "10")?,
            },
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| TrackerError::Config(format!("{} must be set", name)))
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| TrackerError::Config(format!("invalid {}: {}", name, e)))
}
