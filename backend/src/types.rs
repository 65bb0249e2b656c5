use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One observation in a product's price history.
///
/// Sentinel ("no data") raw values are filtered out before a point is
/// created, so `price` is always a real, non-negative amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// Windowed aggregates over a price history, plus the resolved current price.
///
/// `None` means the window held no points or the upstream reported no data.
/// Never zero, never NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub current: Option<Decimal>,
    pub avg30: Option<Decimal>,
    pub avg90: Option<Decimal>,
    pub avg180: Option<Decimal>,
    pub min30: Option<Decimal>,
    pub min90: Option<Decimal>,
    pub min180: Option<Decimal>,
    pub max30: Option<Decimal>,
    pub max90: Option<Decimal>,
    pub max180: Option<Decimal>,
}

/// Normalized product snapshot, assembled once per fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub asin: String,
    pub title: String,
    pub image_url: String,
    pub current_price: Option<Decimal>,
    pub last_update: DateTime<Utc>,
    pub price_history: Vec<PricePoint>,
    pub stats: PriceStats,
}

/// A user-owned, persisted copy of a Product snapshot.
///
/// Independent of later re-fetches: updating a favorite means replacing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub user_key: String,
    pub asin: String,
    pub title: String,
    pub image_url: String,
    pub current_price: Option<Decimal>,
    pub last_update: DateTime<Utc>,
    pub price_history: Vec<PricePoint>,
    pub stats: PriceStats,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// RAW UPSTREAM (KEEPA) SHAPES
// ============================================================================

/// Top-level upstream response: either an error payload or a product list.
#[derive(Debug, Deserialize)]
pub struct KeepaResponse {
    #[serde(default)]
    pub products: Vec<RawProduct>,
    pub error: Option<KeepaApiError>,
}

#[derive(Debug, Deserialize)]
pub struct KeepaApiError {
    pub message: Option<String>,
}

/// One product as the upstream returns it, before normalization.
///
/// `csv` holds positionally-indexed price channels as flat
/// `[minute, price, minute, price, ...]` arrays; channels the upstream has
/// no data for come back as null.
#[derive(Debug, Deserialize)]
pub struct RawProduct {
    pub asin: String,
    pub title: Option<String>,
    /// Minutes since the Unix epoch.
    #[serde(rename = "lastUpdate", default)]
    pub last_update: i64,
    #[serde(rename = "imagesCSV")]
    pub images_csv: Option<String>,
    #[serde(default)]
    pub csv: Option<Vec<Option<Vec<i64>>>>,
    pub stats: Option<RawStats>,
}

/// Pre-aggregated stats block from the upstream.
///
/// `current` is indexed by price channel, same positional order as `csv`.
/// Any `-1` inside means "no observation" and must never surface as a number.
#[derive(Debug, Default, Deserialize)]
pub struct RawStats {
    pub current: Option<Vec<i64>>,
}
