//! API route handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::scraper::Scraper;
use crate::storage::ListingRepository;
use crate::types::{
    ErrorResponse, HealthResponse, ListingParams, ListingRecord, ListingsParams, ListingsResponse,
    ScrapeParams, ScrapeResponse,
};

/// Application state shared across handlers.
pub struct AppState {
    pub scraper: Scraper,
    pub repository: Mutex<ListingRepository>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(scraper: Scraper, repository: ListingRepository, config: AppConfig) -> Self {
        Self {
            scraper,
            repository: Mutex::new(repository),
            config,
        }
    }

    fn persist(&self, records: &[ListingRecord]) -> anyhow::Result<usize> {
        let repo = self
            .repository
            .lock()
            .map_err(|_| anyhow::anyhow!("Listing repository lock poisoned"))?;
        repo.upsert_listings(records)
    }

    fn lookup(&self, key: &str) -> anyhow::Result<Option<ListingRecord>> {
        let repo = self
            .repository
            .lock()
            .map_err(|_| anyhow::anyhow!("Listing repository lock poisoned"))?;
        repo.get_listing(key)
    }

    fn stored(&self, query: Option<&str>, limit: usize) -> anyhow::Result<Vec<ListingRecord>> {
        let repo = self
            .repository
            .lock()
            .map_err(|_| anyhow::anyhow!("Listing repository lock poisoned"))?;
        repo.list_listings(query, limit)
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the HTTP router. The viewer directory, when given, serves every
/// path no API route claims.
pub fn router(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/scrape", get(scrape))
        .route("/listings", get(listings))
        .route("/listing", get(listing));

    let api = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    api.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Scrape endpoint: runs a full scrape and upserts the results.
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScrapeParams>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("query param required, e.g. ?query=coffee+shop+London")
        })?
        .to_string();

    let limit = state.config.scrape.resolve_limit(params.limit.as_deref());

    let results = state.scraper.run(&query, limit).await.map_err(|e| {
        error!("Scrape for \"{}\" failed: {:#}", query, e);
        ApiError::internal(format!("{:#}", e))
    })?;

    let results = if results.is_empty() {
        results
    } else {
        // SQLite writes block; keep them off the async workers
        let store = state.clone();
        let (written, results) = tokio::task::spawn_blocking(move || {
            store.persist(&results).map(|written| (written, results))
        })
        .await
        .map_err(|e| ApiError::internal(format!("Storage task failed: {}", e)))?
        .map_err(|e| {
            error!("Failed to store listings for \"{}\": {:#}", query, e);
            ApiError::internal(format!("{:#}", e))
        })?;
        info!("Stored {} listing(s) for \"{}\"", written, query);
        results
    };

    Ok(Json(ScrapeResponse {
        query,
        count: results.len(),
        results,
    }))
}

/// Stored listings endpoint.
pub async fn listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingsParams>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let limit = state.config.scrape.resolve_limit(params.limit.as_deref());

    let results = state.stored(query, limit).map_err(|e| {
        error!("Failed to read listings: {:#}", e);
        ApiError::internal(format!("{:#}", e))
    })?;

    Ok(Json(ListingsResponse {
        count: results.len(),
        results,
    }))
}

/// One stored listing by its key.
pub async fn listing(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingRecord>, ApiError> {
    let key = params
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("key param required (maps URL or name)"))?;

    let record = state.lookup(key).map_err(|e| {
        error!("Failed to read listing {}: {:#}", key, e);
        ApiError::internal(format!("{:#}", e))
    })?;

    record
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No stored listing for {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::feed::instant_policy;
    use crate::scraper::testing::{FeedFrame, MockPage};
    use crate::scraper::extractor::ListingExtractor;
    use crate::scraper::feed::FeedCollector;
    use crate::scraper::pacing::PacingPlan;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn site() -> MockPage {
        MockPage::new()
            .with_feed(vec![
                FeedFrame::new(&["https://maps/a", "https://maps/b"], 700),
                FeedFrame::new(&["https://maps/c"], 1400),
            ])
            .with_detail("https://maps/a", r#"<h1 class="DUwDvf lfPIob">Alpha</h1>"#)
            .with_detail("https://maps/b", r#"<h1 class="DUwDvf lfPIob">Beta</h1>"#)
            .with_detail("https://maps/c", r#"<h1 class="DUwDvf lfPIob">Gamma</h1>"#)
    }

    fn state_for(page: &MockPage) -> Arc<AppState> {
        let scraper = Scraper::new(
            page.launcher(),
            FeedCollector::new(instant_policy(2)),
            ListingExtractor::new(Duration::ZERO),
            PacingPlan::immediate(),
        );
        Arc::new(AppState::new(
            scraper,
            ListingRepository::in_memory().unwrap(),
            AppConfig::default(),
        ))
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state, None)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_scrape_requires_query() {
        let page = site();
        let (status, body) = get_json(state_for(&page), "/scrape").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("query"));
        assert_eq!(page.launch_count(), 0);

        let (status, _) = get_json(state_for(&page), "/scrape?query=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scrape_returns_and_stores_results() {
        let page = site();
        let state = state_for(&page);
        let (status, body) = get_json(state.clone(), "/scrape?query=bakery&limit=5000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "bakery");
        assert_eq!(body["count"], 3);
        assert_eq!(body["results"][0]["name"], "Alpha");
        assert_eq!(body["results"][2]["mapsUrl"], "https://maps/c");
        assert!(body["results"][0]["phone"].is_null());

        assert_eq!(state.repository.lock().unwrap().count().unwrap(), 3);

        // Same listings again: updated in place
        get_json(state.clone(), "/scrape?query=bakery").await;
        assert_eq!(state.repository.lock().unwrap().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_scrape_applies_limit() {
        let page = site();
        let (status, body) = get_json(state_for(&page), "/scrape?query=bakery&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (_, body) = get_json(state_for(&page), "/scrape?query=bakery&limit=0").await;
        assert_eq!(body["count"], 3);

        let (_, body) = get_json(state_for(&page), "/scrape?query=bakery&limit=lots").await;
        assert_eq!(body["count"], 3);
    }

    #[tokio::test]
    async fn test_scrape_fatal_failure_is_500() {
        let page = site().with_failing_launch();
        let (status, body) = get_json(state_for(&page), "/scrape?query=bakery").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Failed to start browser session"));
    }

    #[tokio::test]
    async fn test_listings_reads_store() {
        let page = site();
        let state = state_for(&page);
        get_json(state.clone(), "/scrape?query=bakery").await;

        let (status, body) = get_json(state.clone(), "/listings?query=bakery&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (_, body) = get_json(state, "/listings?query=tea").await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_listing_lookup_by_key() {
        let page = site();
        let state = state_for(&page);
        get_json(state.clone(), "/scrape?query=bakery").await;

        let (status, body) =
            get_json(state.clone(), "/listing?key=https%3A%2F%2Fmaps%2Fb").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Beta");
        assert_eq!(body["query"], "bakery");

        let (status, body) = get_json(state.clone(), "/listing?key=https%3A%2F%2Fmaps%2Fz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("maps/z"));

        let (status, _) = get_json(state, "/listing").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(state_for(&site()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
