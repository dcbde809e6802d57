//! HTTP front door.
//!
//! Axum router, shared application state, and the permissive CORS layer the
//! reference deployment exposes. Endpoint logic lives in [`handlers`].

pub mod handlers;

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::config::GatewayConfig;
use crate::cookies::CookieStore;
use crate::relay::WafRelay;

/// State shared by every handler. Cheap to clone; the cookie store is a
/// handle onto shared interior state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<WafRelay>,
    pub cookies: CookieStore,
    pub config: GatewayConfig,
}

impl AppState {
    pub fn new(relay: WafRelay, cookies: CookieStore, config: GatewayConfig) -> Self {
        Self {
            relay: Arc::new(relay),
            cookies,
            config,
        }
    }
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(handlers::messages))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::index))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Permissive CORS on every response; preflights are answered locally and
/// never reach the upstream.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response);
    response
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type, Authorization, x-api-key, anthropic-version, anthropic-beta"),
    );
}
