use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid ASIN format: {0}")]
    InvalidAsin(String),

    #[error("Upstream API error: {0}")]
    UpstreamApi(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Malformed price history: {0}")]
    MalformedHistory(String),

    #[error("Daily scan limit reached ({0} scans per day)")]
    ScanLimitReached(u32),

    #[error("Missing or empty X-User-Key header")]
    MissingUserKey,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
