use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::Method,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use stockdash_core::dashboard::listing::{fetch_stock_listing, StockListing};
use stockdash_core::dashboard::predictions::{fetch_shocking_predictions, DEFAULT_TOP_N};
use stockdash_core::domain::prediction::ShockingPredictions;
use stockdash_core::storage::StockStore;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn StockStore>>,
}

impl AppState {
    fn store(&self) -> Result<&Arc<dyn StockStore>, ApiError> {
        self.store.as_ref().ok_or(ApiError::StoreUnavailable)
    }
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks", get(get_stocks))
        .route("/predictions", get(get_predictions))
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    pub ticker: Option<String>,
}

async fn get_stocks(
    State(state): State<AppState>,
    Query(query): Query<StocksQuery>,
) -> Result<Json<StockListing>, ApiError> {
    let store = state.store()?;
    let listing = fetch_stock_listing(store.as_ref(), query.ticker.as_deref())
        .await
        .map_err(ApiError::StockData)?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
pub struct PredictionsQuery {
    #[serde(rename = "topN")]
    pub top_n: Option<String>,
}

async fn get_predictions(
    State(state): State<AppState>,
    Query(query): Query<PredictionsQuery>,
) -> Result<Json<ShockingPredictions>, ApiError> {
    let top_n = parse_top_n(query.top_n.as_deref())?;
    let store = state.store()?;
    let predictions = fetch_shocking_predictions(Arc::clone(store), top_n, chrono::Utc::now())
        .await
        .map_err(ApiError::Predictions)?;
    Ok(Json(predictions))
}

fn parse_top_n(raw: Option<&str>) -> Result<usize, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_TOP_N),
        Some(s) => s
            .parse::<usize>()
            .map_err(|_| ApiError::InvalidTopN(s.to_string())),
    }
}
