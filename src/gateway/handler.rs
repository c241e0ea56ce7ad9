use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::evaluation::{EvaluationResult, VERDICT_TIER_HEADER};
use crate::external::EvaluationProvider;
use crate::gateway::error::GatewayError;
use crate::gateway::payload::{EvaluateRequest, EvaluateResponse};
use crate::gateway::state::HandlerState;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[instrument(skip(state, payload), fields(request_id = tracing::field::Empty))]
pub async fn evaluate_handler<P: EvaluationProvider>(
    State(state): State<HandlerState<P>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request_id = Uuid::new_v4();
    tracing::Span::current().record("request_id", tracing::field::display(request_id));

    let payload: EvaluateRequest = serde_json::from_value(payload)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))?;
    let request = payload.into_request()?;

    let result = state.orchestrator.evaluate(&request).await;
    info!(
        tier = %result.tier,
        status = %result.status,
        score = result.score,
        cached = result.cached,
        error_recovered = result.error_recovered,
        elapsed_ms = result.evaluation_time.as_millis() as u64,
        "Evaluation served"
    );

    make_response(&result, request_id)
}

pub(crate) fn make_response(
    result: &EvaluationResult,
    request_id: Uuid,
) -> Result<Response, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        VERDICT_TIER_HEADER,
        HeaderValue::from_static(result.tier.as_header_value()),
    );
    headers.insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id.to_string())
            .map_err(|e| GatewayError::InternalError(e.to_string()))?,
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(EvaluateResponse::from(result)),
    )
        .into_response())
}
