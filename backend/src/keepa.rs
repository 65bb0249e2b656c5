//! Product Fetcher
//!
//! One authenticated round trip to the upstream price-history API per call,
//! then normalization: raw channels through the price codec, raw stats plus
//! the decoded history through the statistics engine. Upstream failure modes
//! become typed errors; nothing here retries or caches.

use crate::{
    config::KeepaConfig,
    error::{Result, TrackerError},
    history::{decode_history, minutes_to_datetime},
    stats::compute_stats,
    types::{KeepaResponse, Product, RawProduct},
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info};

/// Title used when the upstream omits one.
const DEFAULT_TITLE: &str = "Unknown product";

/// Amazon image host; the upstream returns bare image ids.
const IMAGE_BASE_URL: &str = "https://images-na.ssl-images-amazon.com/images/I/";

/// Shown when a product carries no images at all.
const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/300x300?text=No+Image";

/// Client for the upstream pricing API.
///
/// Holds only immutable configuration; concurrent fetches are independent.
pub struct KeepaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    domain: u32,
    stats_days: i64,
}

impl KeepaClient {
    /// Build a client from configuration.
    ///
    /// The request timeout is enforced here, at client construction, so every
    /// upstream call is bounded.
    pub fn new(config: &KeepaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            domain: config.domain,
            stats_days: config.stats_days,
        })
    }

    /// Fetch and normalize one product by ASIN.
    ///
    /// # Errors
    /// * `InvalidAsin` - format violation, checked before any network call
    /// * `UpstreamApi` - upstream returned an error payload
    /// * `ProductNotFound` - upstream returned zero results
    /// * `MalformedHistory` - channel encoding drifted from the contract
    /// * `Http` - transport failure or timeout
    pub async fn fetch_product(&self, asin: &str) -> Result<Product> {
        validate_asin(asin)?;

        info!("Fetching product data for {}", asin);

        let domain = self.domain.to_string();
        let stats_days = self.stats_days.to_string();

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("domain", domain.as_str()),
                ("asin", asin),
                ("stats", stats_days.as_str()),
                ("history", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<KeepaResponse>()
            .await?;

        map_response(response, asin, self.stats_days, Utc::now())
    }
}

/// Check the fixed ASIN format: exactly 10 characters, uppercase letters and
/// digits only.
pub fn validate_asin(asin: &str) -> Result<()> {
    let well_formed = asin.len() == 10
        && asin
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        Err(TrackerError::InvalidAsin(asin.to_string()))
    }
}

/// Turn a parsed upstream response into a normalized product snapshot.
///
/// Split out from the HTTP call so the mapping is testable on fixtures.
fn map_response(
    response: KeepaResponse,
    asin: &str,
    retention_days: i64,
    fetched_at: DateTime<Utc>,
) -> Result<Product> {
    if let Some(api_error) = response.error {
        let message = api_error
            .message
            .unwrap_or_else(|| "unspecified upstream error".to_string());
        error!("Upstream error for {}: {}", asin, message);
        return Err(TrackerError::UpstreamApi(message));
    }

    let Some(raw) = response.products.into_iter().next() else {
        return Err(TrackerError::ProductNotFound(asin.to_string()));
    };

    map_product(raw, retention_days, fetched_at)
}

fn map_product(raw: RawProduct, retention_days: i64, fetched_at: DateTime<Utc>) -> Result<Product> {
    // Null channels inside csv mean "no data for this price type"; treat
    // them as empty so positional indexing stays intact.
    let channels: Vec<Vec<i64>> = raw
        .csv
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();

    let price_history = decode_history(&channels, retention_days, fetched_at)?;
    let stats = compute_stats(&price_history, raw.stats.as_ref(), fetched_at);

    debug!(
        "Normalized {}: {} history points, current={:?}",
        raw.asin,
        price_history.len(),
        stats.current
    );

    let last_update =
        minutes_to_datetime(raw.last_update).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Ok(Product {
        asin: raw.asin,
        title: raw
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        image_url: image_url(raw.images_csv.as_deref()),
        current_price: stats.current,
        last_update,
        price_history,
        stats,
    })
}

/// Build the product image URL from the upstream's comma-separated image
/// id list, falling back to a placeholder.
fn image_url(images_csv: Option<&str>) -> String {
    match images_csv.and_then(|csv| csv.split(',').next()).filter(|id| !id.is_empty()) {
        Some(id) => format!("{IMAGE_BASE_URL}{id}"),
        None => PLACEHOLDER_IMAGE_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MILLIS_PER_MINUTE;
    use rust_decimal::Decimal;

    #[test]
    fn asin_must_be_ten_uppercase_alphanumerics() {
        assert!(validate_asin("B0CHX3QBCH").is_ok());
        assert!(validate_asin("0123456789").is_ok());

        // 11 characters, and lowercase besides.
        assert!(matches!(
            validate_asin("b0chx3qbch1"),
            Err(TrackerError::InvalidAsin(_))
        ));
        assert!(validate_asin("B0CHX3QBC").is_err());
        assert!(validate_asin("b0chx3qbch").is_err());
        assert!(validate_asin("B0CHX3QBC!").is_err());
        assert!(validate_asin("").is_err());
    }

    #[test]
    fn error_payload_maps_to_upstream_api_error() {
        let response: KeepaResponse =
            serde_json::from_str(r#"{ "error": { "message": "invalid API key" } }"#).unwrap();
        let err = map_response(response, "B0CHX3QBCH", 180, Utc::now()).unwrap_err();
        match err {
            TrackerError::UpstreamApi(message) => assert_eq!(message, "invalid API key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_product_list_maps_to_not_found() {
        let response: KeepaResponse = serde_json::from_str(r#"{ "products": [] }"#).unwrap();
        let err = map_response(response, "B0CHX3QBCH", 180, Utc::now()).unwrap_err();
        assert!(matches!(err, TrackerError::ProductNotFound(_)));
    }

    #[test]
    fn full_response_maps_to_normalized_product() {
        let response: KeepaResponse = serde_json::from_str(
            r#"{
                "products": [{
                    "asin": "B0CHX3QBCH",
                    "title": "USB-C Charger",
                    "lastUpdate": 60001440,
                    "imagesCSV": "81abc123._SL1500_.jpg,41def456.jpg",
                    "csv": [
                        [60000000, 1999, 60001440, -1],
                        [60000000, -1, 60001440, 2499]
                    ],
                    "stats": { "current": [1899, 2399] }
                }]
            }"#,
        )
        .unwrap();

        let fetched_at = minutes_to_datetime(60_001_440).unwrap() + chrono::Duration::days(1);
        let product = map_response(response, "B0CHX3QBCH", 180, fetched_at).unwrap();

        assert_eq!(product.asin, "B0CHX3QBCH");
        assert_eq!(product.title, "USB-C Charger");
        assert_eq!(
            product.image_url,
            format!("{IMAGE_BASE_URL}81abc123._SL1500_.jpg")
        );
        assert_eq!(
            product.last_update.timestamp_millis(),
            60_001_440 * MILLIS_PER_MINUTE
        );

        assert_eq!(product.price_history.len(), 2);
        assert_eq!(product.price_history[0].price, Decimal::new(1999, 2));
        assert_eq!(product.price_history[1].price, Decimal::new(2499, 2));

        assert_eq!(product.current_price, Some(Decimal::new(1899, 2)));
        assert_eq!(product.stats.min180, Some(Decimal::new(1999, 2)));
        assert_eq!(product.stats.max180, Some(Decimal::new(2499, 2)));
        assert_eq!(product.stats.avg180, Some(Decimal::new(2249, 2)));
    }

    #[test]
    fn missing_title_image_and_stats_fall_back() {
        let response: KeepaResponse = serde_json::from_str(
            r#"{
                "products": [{
                    "asin": "B0CHX3QBCH",
                    "title": null,
                    "lastUpdate": 0,
                    "csv": null,
                    "stats": null
                }]
            }"#,
        )
        .unwrap();

        let product = map_response(response, "B0CHX3QBCH", 180, Utc::now()).unwrap();
        assert_eq!(product.title, DEFAULT_TITLE);
        assert_eq!(product.image_url, PLACEHOLDER_IMAGE_URL);
        assert!(product.price_history.is_empty());
        assert_eq!(product.current_price, None);
        assert_eq!(product.stats.avg30, None);
    }

    #[test]
    fn null_channel_inside_csv_is_tolerated() {
        let response: KeepaResponse = serde_json::from_str(
            r#"{
                "products": [{
                    "asin": "B0CHX3QBCH",
                    "title": "Thing",
                    "lastUpdate": 60001440,
                    "csv": [null, [60000000, 1099]],
                    "stats": {}
                }]
            }"#,
        )
        .unwrap();

        // Primary channel is null, so no points come out even though the
        // secondary has data; gap filling only patches sentinel pairs.
        let fetched_at = minutes_to_datetime(60_001_440).unwrap();
        let product = map_response(response, "B0CHX3QBCH", 180, fetched_at).unwrap();
        assert!(product.price_history.is_empty());
    }

    #[test]
    fn odd_length_channel_surfaces_malformed_history() {
        let response: KeepaResponse = serde_json::from_str(
            r#"{
                "products": [{
                    "asin": "B0CHX3QBCH",
                    "title": "Thing",
                    "lastUpdate": 60001440,
                    "csv": [[60000000, 1099, 60001440]],
                    "stats": {}
                }]
            }"#,
        )
        .unwrap();

        let err = map_response(response, "B0CHX3QBCH", 180, Utc::now()).unwrap_err();
        assert!(matches!(err, TrackerError::MalformedHistory(_)));
    }
}
