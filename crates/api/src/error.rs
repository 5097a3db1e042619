use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to fetch stock data")]
    StockData(#[source] anyhow::Error),

    #[error("Failed to fetch predictions")]
    Predictions(#[source] anyhow::Error),

    #[error("topN must be a non-negative integer")]
    InvalidTopN(String),

    #[error("Store unavailable")]
    StoreUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StockData(_) | ApiError::Predictions(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidTopN(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::StockData(cause) | ApiError::Predictions(cause) => {
                sentry_anyhow::capture_anyhow(cause);
                tracing::error!(error = %format!("{cause:#}"), "{self}");
            }
            ApiError::InvalidTopN(raw) => tracing::debug!(top_n = %raw, "rejected topN"),
            ApiError::StoreUnavailable => {}
        }

        // Only the fixed message reaches the client.
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
