//! # wafrelay
//!
//! A local forwarding gateway for an AI-completion API that sits behind an
//! ACW-style web application firewall. Clients talk the normal completion
//! protocol to this process; the gateway solves the WAF's JavaScript
//! challenge pages transparently, maintains the resulting session cookie,
//! and disguises outbound requests as the one client the upstream accepts.
//!
//! ## Layout
//!
//! - [`challenge`]: detect challenge pages and derive the session cookie
//! - [`cookies`]: explicit per-origin cookie store
//! - [`upstream`]: transport trait, content decoding, single-attempt forwarder
//! - [`relay`]: the retrying solve-and-replay pipeline
//! - [`fingerprint`]: outbound header and body rewriting
//! - [`server`]: the axum front door
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wafrelay::config::GatewayConfig;
//! use wafrelay::cookies::CookieStore;
//! use wafrelay::relay::WafRelay;
//! use wafrelay::upstream::{RawForwarder, ReqwestUpstreamClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let cookies = CookieStore::new();
//! let client = Arc::new(ReqwestUpstreamClient::new()?);
//! let forwarder = RawForwarder::new(client, cookies.clone());
//! let relay = WafRelay::new(forwarder, cookies.clone())
//!     .with_max_retries(config.max_retries);
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod config;
pub mod cookies;
pub mod error;
pub mod fingerprint;
pub mod relay;
pub mod server;
pub mod upstream;

pub use challenge::{is_waf_challenge, solve_challenge, SESSION_COOKIE_NAME};
pub use config::GatewayConfig;
pub use cookies::CookieStore;
pub use error::GatewayError;
pub use relay::{RelayError, WafRelay};
pub use server::{router, AppState};
pub use upstream::{RawForwarder, ReqwestUpstreamClient};

/// Crate version, surfaced by the root endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
