//! ACW WAF challenge handling.
//!
//! The upstream's bot-mitigation layer occasionally answers a request with an
//! HTML page carrying an embedded, script-computed verification value instead
//! of the real payload. This module recognises those pages and derives the
//! session cookie the WAF expects, without evaluating any JavaScript: the
//! transform is a fixed character permutation followed by a byte-wise XOR.

pub mod decode;
pub mod detect;

pub use decode::{solve_challenge, SESSION_COOKIE_NAME};
pub use detect::{extract_token, is_waf_challenge};
