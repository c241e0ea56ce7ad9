use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::evaluation::{VERDICT_STATUS_ERROR, VERDICT_STATUS_HEADER};

/// Failures surfaced at the HTTP boundary.
///
/// The pipeline itself never fails; these only cover requests that never reach it.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, verdict_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            VERDICT_STATUS_HEADER,
            HeaderValue::from_str(verdict_status)
                .unwrap_or(HeaderValue::from_static(VERDICT_STATUS_ERROR)),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
