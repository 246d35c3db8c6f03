//! HTTP surface: `POST /translate`, `GET /health`, `GET /metrics`.

use crate::metrics::MetricsReport;
use crate::translation::{TranslateError, TranslationRequest, TranslationResult, Translator};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Build the service router around a shared translator.
pub fn router(translator: Arc<Translator>) -> Router {
    Router::new()
        .route("/translate", post(translate))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(translator)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// A failed request: one status code, one human-readable message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        let status = match &err {
            TranslateError::MissingField(_) | TranslateError::InvalidLanguageTag { .. } => {
                StatusCode::BAD_REQUEST
            }
            TranslateError::Unauthorized => StatusCode::UNAUTHORIZED,
            TranslateError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid request: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

async fn translate(
    State(translator): State<Arc<Translator>>,
    payload: Result<Json<TranslationRequest>, JsonRejection>,
) -> Result<Json<TranslationResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected malformed translation request: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    match translator.translate(&request).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            if matches!(err, TranslateError::Provider(_)) {
                error!("Translation failed: {}", err);
            }
            Err(err.into())
        }
    }
}

/// 200 when the cache store answers, 503 otherwise.
async fn health_check(State(translator): State<Arc<Translator>>) -> (StatusCode, String) {
    match translator.cache_health().await {
        Ok(()) => (StatusCode::OK, "OK".to_string()),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Cache health check failed: {}", e),
            )
        }
    }
}

async fn metrics(State(translator): State<Arc<Translator>>) -> Json<MetricsReport> {
    Json(translator.metrics())
}
