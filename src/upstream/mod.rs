//! Upstream transport: the HTTP client seam, content decoding, and the
//! cookie-threading raw forwarder.

pub mod client;
pub mod encoding;
pub mod forwarder;

pub use client::{RawResponse, ReqwestUpstreamClient, TransportError, UpstreamHttpClient};
pub use encoding::{decompress, DecodeError};
pub use forwarder::{ForwardError, ForwardResponse, RawForwarder};
