//! Favorites Store
//!
//! Persists user favorites, each a value copy of a Product snapshot keyed by
//! (user, ASIN). The snapshot parts (history, stats) are stored as JSONB so a
//! favorite stays independent of later re-fetches. Updates are replacements:
//! inserting over an existing (user, ASIN) overwrites the stored snapshot.

use crate::{
    error::Result,
    types::{Favorite, PricePoint, PriceStats},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::{debug, info};

/// Database client for favorites storage
pub struct Database {
    pool: PgPool,
}

#[derive(FromRow)]
struct FavoriteRow {
    user_key: String,
    asin: String,
    title: String,
    image_url: String,
    current_price: Option<Decimal>,
    last_update: DateTime<Utc>,
    price_history: Json<Vec<PricePoint>>,
    stats: Json<PriceStats>,
    created_at: DateTime<Utc>,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Favorite {
            user_key: row.user_key,
            asin: row.asin,
            title: row.title,
            image_url: row.image_url,
            current_price: row.current_price,
            last_update: row.last_update,
            price_history: row.price_history.0,
            stats: row.stats.0,
            created_at: row.created_at,
        }
    }
}

impl Database {
    /// Create a new database client
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("Database connected successfully");

        Ok(Self { pool })
    }

    /// Run database migrations
    ///
    /// Call this on application startup to ensure schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Store a favorite, replacing any existing snapshot for the same
    /// (user, ASIN). `created_at` survives replacement.
    ///
    /// Returns the row as persisted, which on replacement differs from the
    /// input in `created_at`.
    pub async fn insert_favorite(&self, favorite: &Favorite) -> Result<Favorite> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            r#"
            INSERT INTO favorites
                (user_key, asin, title, image_url, current_price, last_update,
                 price_history, stats, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_key, asin)
            DO UPDATE SET
                title = $3,
                image_url = $4,
                current_price = $5,
                last_update = $6,
                price_history = $7,
                stats = $8
            RETURNING user_key, asin, title, image_url, current_price,
                      last_update, price_history, stats, created_at
            "#,
        )
        .bind(&favorite.user_key)
        .bind(&favorite.asin)
        .bind(&favorite.title)
        .bind(&favorite.image_url)
        .bind(favorite.current_price)
        .bind(favorite.last_update)
        .bind(Json(&favorite.price_history))
        .bind(Json(&favorite.stats))
        .bind(favorite.created_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            "Stored favorite {} for user {}",
            favorite.asin, favorite.user_key
        );
        Ok(row.into())
    }

    /// Get all favorites for a user, newest first.
    pub async fn list_favorites(&self, user_key: &str) -> Result<Vec<Favorite>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT user_key, asin, title, image_url, current_price, last_update,
                   price_history, stats, created_at
            FROM favorites
            WHERE user_key = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    /// Get one favorite by (user, ASIN).
    pub async fn get_favorite(&self, user_key: &str, asin: &str) -> Result<Option<Favorite>> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT user_key, asin, title, image_url, current_price, last_update,
                   price_history, stats, created_at
            FROM favorites
            WHERE user_key = $1 AND asin = $2
            "#,
        )
        .bind(user_key)
        .bind(asin)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Favorite::from))
    }

    /// Delete one favorite. Returns whether a row existed.
    pub async fn delete_favorite(&self, user_key: &str, asin: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM favorites
            WHERE user_key = $1 AND asin = $2
            "#,
        )
        .bind(user_key)
        .bind(asin)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check database connectivity
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_favorite(user_key: &str, created_at: DateTime<Utc>) -> Favorite {
        Favorite {
            user_key: user_key.to_string(),
            asin: "B0CHX3QBCH".to_string(),
            title: "USB-C Charger".to_string(),
            image_url: "https://example.com/image.jpg".to_string(),
            current_price: Some(Decimal::new(1999, 2)),
            last_update: Utc::now(),
            price_history: Vec::new(),
            stats: PriceStats::default(),
            created_at,
        }
    }

    // Note: The following tests require a running Postgres instance with
    // DATABASE_URL set. Run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore]
    async fn replacement_preserves_stored_created_at() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let db = Database::new(&url).await.unwrap();
        db.migrate().await.unwrap();

        let user = format!("created-at-test-{}", Utc::now().timestamp_millis());

        let first = sample_favorite(&user, Utc::now() - Duration::days(1));
        let stored = db.insert_favorite(&first).await.unwrap();
        assert_eq!(
            stored.created_at.timestamp_micros(),
            first.created_at.timestamp_micros()
        );

        // Replace the snapshot; the returned row must carry the original
        // created_at, not the new one.
        let mut second = sample_favorite(&user, Utc::now());
        second.title = "Replaced".to_string();
        let replaced = db.insert_favorite(&second).await.unwrap();
        assert_eq!(replaced.title, "Replaced");
        assert_eq!(
            replaced.created_at.timestamp_micros(),
            first.created_at.timestamp_micros()
        );

        assert!(db.delete_favorite(&user, &first.asin).await.unwrap());
    }
}
