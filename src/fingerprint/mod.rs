//! Outbound request fingerprinting.
//!
//! The upstream only serves callers that look like a specific known client,
//! so the builder rewrites both the header set and the request body to match
//! that client's shape. The exact field list is an external contract kept in
//! sync with the upstream, not derived logic; it lives here as constant data.

pub mod body;
pub mod headers;

pub use body::{augment_request, supports_adaptive_thinking, ValidationError};
pub use headers::build_headers;
