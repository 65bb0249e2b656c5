//! REST API
//!
//! HTTP endpoints for product lookups, scan-limited lookups, and favorites.
//! The caller's identity arrives as the `X-User-Key` header; authentication
//! itself happens upstream of this service.

use crate::{
    database::Database,
    error::{Result, TrackerError},
    keepa::KeepaClient,
    scan_limit::ScanLimiter,
    types::{Favorite, PricePoint, PriceStats, Product},
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub keepa: Arc<KeepaClient>,
    pub db: Arc<Database>,
    pub scans: Arc<Mutex<ScanLimiter>>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Product endpoints
        .route("/api/v1/products/:asin", get(get_product))
        .route("/api/v1/scan", get(scan_usage))
        .route("/api/v1/scan/:asin", post(scan_product))
        // Favorites endpoints
        .route("/api/v1/favorites", get(list_favorites).post(create_favorite))
        .route(
            "/api/v1/favorites/:asin",
            get(get_favorite).delete(delete_favorite),
        )
        // Health endpoint
        .route("/api/v1/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// PRODUCT ENDPOINTS
// ============================================================================

/// GET /api/v1/products/:asin
///
/// Fetch a normalized product snapshot. Not counted against the scan limit.
async fn get_product(
    State(state): State<AppState>,
    Path(asin): Path<String>,
) -> Result<Json<ProductResponse>> {
    info!("Product lookup for {}", asin);

    let product = state.keepa.fetch_product(&asin).await?;

    Ok(Json(ProductResponse {
        success: true,
        data: product,
    }))
}

/// POST /api/v1/scan/:asin
///
/// Count one scan against the caller's daily allowance, then fetch.
async fn scan_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asin): Path<String>,
) -> Result<Json<ScanResponse>> {
    let user_key = user_key(&headers)?;
    // Reject malformed ASINs before the scan is counted; a bad request must
    // not burn allowance.
    crate::keepa::validate_asin(&asin)?;

    let (scans_used, daily_limit) = {
        let mut scans = state.scans.lock().await;
        (scans.register_scan(&user_key).await?, scans.daily_limit())
    };

    let product = state.keepa.fetch_product(&asin).await?;

    Ok(Json(ScanResponse {
        success: true,
        data: product,
        scans_used,
        daily_limit,
    }))
}

/// GET /api/v1/scan
///
/// Report how much of today's scan allowance the caller has used.
async fn scan_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScanUsageResponse>> {
    let user_key = user_key(&headers)?;

    let mut scans = state.scans.lock().await;
    let scans_used = scans.scans_used(&user_key).await?;

    Ok(Json(ScanUsageResponse {
        success: true,
        scans_used,
        daily_limit: scans.daily_limit(),
    }))
}

// ============================================================================
// FAVORITES ENDPOINTS
// ============================================================================

/// GET /api/v1/favorites
///
/// List the caller's favorites, newest first.
async fn list_favorites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FavoritesResponse>> {
    let user_key = user_key(&headers)?;

    let favorites = state.db.list_favorites(&user_key).await?;

    Ok(Json(FavoritesResponse {
        success: true,
        count: favorites.len(),
        data: favorites,
    }))
}

/// POST /api/v1/favorites
///
/// Store a product snapshot as a favorite. Replaces any existing favorite
/// for the same ASIN.
async fn create_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateFavoriteRequest>,
) -> Result<(StatusCode, Json<FavoriteResponse>)> {
    let user_key = user_key(&headers)?;
    crate::keepa::validate_asin(&body.asin)?;

    let favorite = Favorite {
        user_key,
        asin: body.asin,
        title: body.title,
        image_url: body.image_url,
        current_price: body.current_price,
        last_update: body.last_update,
        price_history: body.price_history,
        stats: body.stats,
        created_at: Utc::now(),
    };

    // Replacement keeps the original created_at; echo the row as stored,
    // not the snapshot we sent.
    let stored = state.db.insert_favorite(&favorite).await?;

    Ok((
        StatusCode::CREATED,
        Json(FavoriteResponse {
            success: true,
            data: stored,
        }),
    ))
}

/// GET /api/v1/favorites/:asin
async fn get_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asin): Path<String>,
) -> Result<Json<FavoriteResponse>> {
    let user_key = user_key(&headers)?;

    let favorite = state
        .db
        .get_favorite(&user_key, &asin)
        .await?
        .ok_or_else(|| TrackerError::ProductNotFound(asin))?;

    Ok(Json(FavoriteResponse {
        success: true,
        data: favorite,
    }))
}

/// DELETE /api/v1/favorites/:asin
async fn delete_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asin): Path<String>,
) -> Result<Json<MessageResponse>> {
    let user_key = user_key(&headers)?;

    if !state.db.delete_favorite(&user_key, &asin).await? {
        return Err(TrackerError::ProductNotFound(asin));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Favorite removed".to_string(),
    }))
}

// ============================================================================
// HEALTH ENDPOINT
// ============================================================================

/// GET /api/v1/health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.health_check().await;
    let redis = state.scans.lock().await.health_check().await;

    Json(HealthResponse {
        success: database && redis,
        database,
        redis,
        timestamp: Utc::now().timestamp(),
    })
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Pull the caller's identity from the `X-User-Key` header.
fn user_key(headers: &HeaderMap) -> Result<String> {
    headers
        .get("x-user-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(TrackerError::MissingUserKey)
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

/// Body for POST /api/v1/favorites: a Product snapshot to copy.
#[derive(Debug, Deserialize)]
pub struct CreateFavoriteRequest {
    pub asin: String,
    pub title: String,
    pub image_url: String,
    pub current_price: Option<Decimal>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub price_history: Vec<PricePoint>,
    #[serde(default)]
    pub stats: PriceStats,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub data: Product,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub data: Product,
    pub scans_used: u32,
    pub daily_limit: u32,
}

#[derive(Debug, Serialize)]
pub struct ScanUsageResponse {
    pub success: bool,
    pub scans_used: u32,
    pub daily_limit: u32,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Favorite>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub success: bool,
    pub data: Favorite,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub database: bool,
    pub redis: bool,
    pub timestamp: i64,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TrackerError::InvalidAsin(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            TrackerError::MissingUserKey => (StatusCode::UNAUTHORIZED, self.to_string()),
            TrackerError::ProductNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            TrackerError::ScanLimitReached(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            TrackerError::UpstreamApi(_) | TrackerError::Http(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            TrackerError::MalformedHistory(_) => {
                // Upstream contract drift; log the detail, return a generic failure.
                error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected upstream data".to_string(),
                )
            }
            TrackerError::Database(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            }
            TrackerError::Redis(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Cache error: {}", e))
            }
            TrackerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn user_key_comes_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-key", HeaderValue::from_static("user@example.com"));
        assert_eq!(user_key(&headers).unwrap(), "user@example.com");
    }

    #[test]
    fn missing_or_blank_user_key_is_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(
            user_key(&headers),
            Err(TrackerError::MissingUserKey)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("x-user-key", HeaderValue::from_static("   "));
        assert!(matches!(
            user_key(&headers),
            Err(TrackerError::MissingUserKey)
        ));
    }

    #[test]
    fn errors_map_to_expected_statuses() {
        let cases = [
            (
                TrackerError::InvalidAsin("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (TrackerError::MissingUserKey, StatusCode::UNAUTHORIZED),
            (
                TrackerError::ProductNotFound("B0CHX3QBCH".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                TrackerError::ScanLimitReached(5),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                TrackerError::UpstreamApi("boom".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TrackerError::MalformedHistory("odd".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    // Note: The following test requires running Postgres (DATABASE_URL set)
    // and Redis instances. Run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore]
    async fn rejected_asin_does_not_consume_scan_allowance() {
        let db = Database::new(&std::env::var("DATABASE_URL").unwrap())
            .await
            .unwrap();
        let scans = ScanLimiter::new("redis://127.0.0.1", 5).await.unwrap();
        let keepa = KeepaClient::new(&crate::config::KeepaConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            domain: 1,
            stats_days: 180,
            request_timeout_secs: 1,
        })
        .unwrap();

        let state = AppState {
            keepa: Arc::new(keepa),
            db: Arc::new(db),
            scans: Arc::new(Mutex::new(scans)),
        };

        let user = format!("scan-guard-{}", Utc::now().timestamp_millis());
        let mut headers = HeaderMap::new();
        headers.insert("x-user-key", HeaderValue::from_str(&user).unwrap());

        let result = scan_product(
            State(state.clone()),
            headers,
            Path("b0chx3qbch1".to_string()),
        )
        .await;
        assert!(matches!(result, Err(TrackerError::InvalidAsin(_))));

        let used = state.scans.lock().await.scans_used(&user).await.unwrap();
        assert_eq!(used, 0);
    }
}
