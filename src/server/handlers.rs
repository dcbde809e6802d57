//! Endpoint implementations.
//!
//! `POST /v1/messages` is the forwarding path: extract the credential,
//! augment the body, build the fingerprinted header set, hand the exchange
//! to the relay, then classify the final upstream body. Event-stream bodies
//! are re-emitted line by line so client SSE parsers see the original frame
//! boundaries; everything else is relayed as JSON or rejected.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde_json::{json, Value};
use std::convert::Infallible;

use crate::challenge::is_waf_challenge;
use crate::error::GatewayError;
use crate::fingerprint::{augment_request, build_headers};
use crate::server::AppState;
use crate::upstream::ForwardResponse;

/// Forward one completion request through the challenge-solving relay.
pub async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let api_key = extract_credential(&headers).ok_or(GatewayError::Authentication)?;

    let mut payload: Value = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::Validation(format!("invalid JSON body: {err}")))?;
    augment_request(&mut payload)
        .map_err(|err| GatewayError::Validation(err.to_string()))?;

    let streaming = payload
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let outbound_body = serde_json::to_vec(&payload)
        .map_err(|err| GatewayError::Validation(err.to_string()))?;
    let outbound_headers = build_headers(
        &headers,
        &api_key,
        streaming,
        &model,
        outbound_body.len(),
    );

    let url = state.config.messages_endpoint();
    log::info!(
        "relaying completion request: model={model} stream={streaming}"
    );
    let response = state
        .relay
        .send(&url, &outbound_headers, Some(outbound_body.as_slice()))
        .await?;

    if response.status == 200 && is_waf_challenge(&response.body) {
        return Err(GatewayError::ChallengeUnresolved);
    }

    // The request's stream flag alone selects the relay mode; a non-challenge
    // body on a stream request is piped through as SSE whatever the upstream
    // declared.
    if streaming {
        return Ok(sse_response(response));
    }

    relay_json(response)
}

/// Credential from `x-api-key`, falling back to a bearer token.
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
    {
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            // Scheme matching is case-insensitive per RFC 7235.
            let (scheme, token) = value.split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("Bearer")
                .then(|| token.trim_start())
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Re-emit a buffered event stream with the original line boundaries.
fn sse_response(upstream: ForwardResponse) -> Response {
    let lines: Vec<Result<Bytes, Infallible>> = upstream
        .body
        .split_inclusive('\n')
        .map(|line| Ok(Bytes::copy_from_slice(line.as_bytes())))
        .collect();

    let mut response = Response::new(Body::from_stream(stream::iter(lines)));
    *response.status_mut() =
        StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::OK);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Relay a buffered upstream body, which must be JSON to be forwarded.
fn relay_json(upstream: ForwardResponse) -> Result<Response, GatewayError> {
    match serde_json::from_str::<Value>(&upstream.body) {
        Ok(value) => {
            let status =
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(value)).into_response())
        }
        Err(_) => {
            let snippet: String = upstream.body.chars().take(200).collect();
            Err(GatewayError::Upstream(format!(
                "status {} with non-JSON body: {snippet}",
                upstream.status
            )))
        }
    }
}

/// Liveness and session-state probe.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": "waf-relay",
        "upstream": state.config.upstream_url.as_str(),
        "cookies": if state.cookies.is_empty() { "none" } else { "present" },
    }))
}

/// Service descriptor at the root.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "wafrelay",
        "version": crate::VERSION,
        "upstream": state.config.upstream_url.as_str(),
        "endpoints": {
            "messages": "POST /v1/messages",
            "health": "GET /health",
        },
    }))
}

/// Structured 404 for anything off the route table.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "type": "error",
            "error": {
                "type": "not_found_error",
                "message": "unknown endpoint",
            }
        })),
    )
        .into_response()
}
