//! Gateway error taxonomy and its HTTP rendering.
//!
//! Every failure a handler can surface maps to one wire shape:
//! `{"type":"error","error":{"type":...,"message":...}}` with a status code
//! determined by the variant. Handlers return `GatewayError` and let the
//! `IntoResponse` impl do the rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::relay::RelayError;
use crate::upstream::ForwardError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No credential in `x-api-key` or `Authorization: Bearer`.
    #[error("missing API key: provide x-api-key header or Authorization: Bearer token")]
    Authentication,
    /// Request body was not valid JSON or not a JSON object.
    #[error("{0}")]
    Validation(String),
    /// The final upstream response was still a challenge page.
    #[error("WAF challenge could not be resolved")]
    ChallengeUnresolved,
    /// Every attempt in the retry budget came back as a challenge.
    #[error("WAF challenge persisted through {attempts} attempt(s)")]
    RetriesExceeded { attempts: usize },
    /// Upstream answered with something the client protocol cannot carry.
    #[error("upstream returned an unexpected response: {0}")]
    Upstream(String),
    /// Transport failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Network(String),
    /// Upstream body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Wire-level error type string, per the client protocol's envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Authentication => "authentication_error",
            GatewayError::Validation(_) => "invalid_request_error",
            GatewayError::ChallengeUnresolved | GatewayError::RetriesExceeded { .. } => {
                "waf_error"
            }
            GatewayError::Upstream(_) => "upstream_error",
            GatewayError::Network(_) => "api_error",
            GatewayError::Decode(_) => "api_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Authentication => StatusCode::UNAUTHORIZED,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::ChallengeUnresolved | GatewayError::RetriesExceeded { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON body this error renders to, also reused verbatim inside SSE
    /// error frames.
    pub fn body(&self) -> serde_json::Value {
        json!({
            "type": "error",
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<RelayError> for GatewayError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::RetriesExceeded { attempts } => {
                GatewayError::RetriesExceeded { attempts }
            }
            RelayError::Forward(ForwardError::Network(inner)) => {
                GatewayError::Network(inner.to_string())
            }
            RelayError::Forward(ForwardError::Decode(inner)) => {
                GatewayError::Decode(inner.to_string())
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        log::warn!("request failed: {self}");
        (self.status(), Json(self.body())).into_response()
    }
}
