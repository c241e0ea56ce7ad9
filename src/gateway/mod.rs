//! HTTP gateway (Axum) in front of the evaluation pipeline.
//!
//! This module is primarily used by the `verdict` server binary.

#![allow(missing_docs)]

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{REQUEST_ID_HEADER, evaluate_handler};
pub use payload::{CacheStatus, EvaluateRequest, EvaluateResponse};
pub use state::HandlerState;

use crate::evaluation::{VERDICT_STATUS_HEADER, VERDICT_STATUS_HEALTHY};
use crate::external::EvaluationProvider;
use crate::metrics::MetricsSnapshot;

pub fn create_router_with_state<P: EvaluationProvider>(state: HandlerState<P>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/metrics/reset", post(reset_metrics_handler))
        .route("/admin/cache", get(cache_status_handler))
        .route("/v1/evaluate", post(evaluate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        VERDICT_STATUS_HEADER,
        HeaderValue::from_static(VERDICT_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn metrics_handler<P: EvaluationProvider>(
    State(state): State<HandlerState<P>>,
) -> Json<MetricsSnapshot> {
    Json(state.orchestrator.metrics().snapshot())
}

/// Zeroes every counter and returns the fresh snapshot.
#[tracing::instrument(skip(state))]
pub async fn reset_metrics_handler<P: EvaluationProvider>(
    State(state): State<HandlerState<P>>,
) -> Json<MetricsSnapshot> {
    let metrics = state.orchestrator.metrics();
    metrics.reset();
    tracing::info!("Metrics reset by operator");
    Json(metrics.snapshot())
}

#[tracing::instrument(skip(state))]
pub async fn cache_status_handler<P: EvaluationProvider>(
    State(state): State<HandlerState<P>>,
) -> Json<CacheStatus> {
    let cache = state.orchestrator.exact_cache();
    Json(CacheStatus {
        entries: cache.len(),
        capacity: cache.capacity(),
        ttl_secs: cache.config().ttl.as_secs(),
    })
}
