//! Scan Limiter
//!
//! Per-user daily scan counter backed by Redis. Keys carry the UTC date
//! (`scans:{user}:{YYYY-MM-DD}`), so the counter resets at midnight without
//! any scheduled job; stale keys expire on their own.

use crate::error::{Result, TrackerError};
use chrono::{NaiveDate, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, warn};

/// Keep counter keys around long enough to outlive their day.
const KEY_TTL_SECS: i64 = 48 * 60 * 60;

/// Counter key for one user and one UTC day. The embedded date is what
/// makes the counter reset daily.
fn scan_key(user_key: &str, day: NaiveDate) -> String {
    format!("scans:{}:{}", user_key, day.format("%Y-%m-%d"))
}

/// Redis-backed daily scan counter
pub struct ScanLimiter {
    connection: ConnectionManager,
    daily_limit: u32,
}

impl ScanLimiter {
    /// Connect to Redis and configure the daily limit.
    pub async fn new(redis_url: &str, daily_limit: u32) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        debug!("Scan limiter connected to {}", redis_url);

        Ok(Self {
            connection,
            daily_limit,
        })
    }

    /// Count one scan against the user's daily allowance.
    ///
    /// Returns the number of scans used today (including this one).
    ///
    /// # Errors
    /// `ScanLimitReached` once the allowance is exhausted; the counter is not
    /// advanced past the limit.
    pub async fn register_scan(&mut self, user_key: &str) -> Result<u32> {
        let key = self.make_key(user_key);

        let used: u32 = self.connection.incr(&key, 1u32).await?;
        // INCR created the key on first use; bound its lifetime.
        if used == 1 {
            self.connection.expire::<_, ()>(&key, KEY_TTL_SECS).await?;
        }

        if used > self.daily_limit {
            // Undo so repeated rejected attempts don't inflate the counter.
            self.connection.decr::<_, _, ()>(&key, 1u32).await?;
            warn!(
                "User {} exhausted daily scan limit ({})",
                user_key, self.daily_limit
            );
            return Err(TrackerError::ScanLimitReached(self.daily_limit));
        }

        debug!("User {} scan {}/{}", user_key, used, self.daily_limit);
        Ok(used)
    }

    /// Read today's counter without touching it.
    pub async fn scans_used(&mut self, user_key: &str) -> Result<u32> {
        let key = self.make_key(user_key);
        let used: Option<u32> = self.connection.get(&key).await?;
        Ok(used.unwrap_or(0))
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Check Redis connectivity
    pub async fn health_check(&mut self) -> bool {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.connection)
            .await
            .is_ok()
    }

    fn make_key(&self, user_key: &str) -> String {
        scan_key(user_key, Utc::now().date_naive())
    }
}
