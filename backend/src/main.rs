use std::sync::Arc;
use tokio::sync::Mutex;

mod api;
mod config;
mod database;
mod error;
mod history;
mod keepa;
mod scan_limit;
mod stats;
mod types;

use api::AppState;
use config::Config;
use database::Database;
use keepa::KeepaClient;
use scan_limit::ScanLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (print debug messages)
    tracing_subscriber::fmt::init();

    tracing::info!("Starting price tracker backend...");

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize database connection and schema
    tracing::info!("Connecting to database...");
    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;

    // Initialize the Redis-backed scan limiter
    tracing::info!("Connecting to Redis...");
    let scans = ScanLimiter::new(&config.redis_url, config.daily_scan_limit).await?;

    // Upstream pricing API client
    let keepa = KeepaClient::new(&config.keepa)?;

    let state = AppState {
        keepa: Arc::new(keepa),
        db: Arc::new(db),
        scans: Arc::new(Mutex::new(scans)),
    };

    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
