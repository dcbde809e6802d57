//! Response body decompression.
//!
//! The forwarder pins `Accept-Encoding` itself, which bypasses reqwest's
//! automatic decompression, so declared encodings are decoded here on the
//! buffered body. A decoder failure surfaces as an error rather than letting
//! compressed bytes masquerade as body text.

use std::io::Read;

use thiserror::Error;

/// Failure to decode a declared `Content-Encoding`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode {encoding} body: {source}")]
    Corrupt {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported content-encoding: {0}")]
    Unsupported(String),
}

/// Decompress `body` according to the `Content-Encoding` value. Empty and
/// `identity` encodings pass the bytes through unchanged.
pub fn decompress(body: &[u8], encoding: &str) -> Result<Vec<u8>, DecodeError> {
    match encoding.to_ascii_lowercase().as_str() {
        "gzip" => {
            let mut decoder = flate2::read::GzDecoder::new(body);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|source| DecodeError::Corrupt {
                    encoding: "gzip",
                    source,
                })?;
            Ok(decoded)
        }
        "deflate" => {
            let mut decoder = flate2::read::ZlibDecoder::new(body);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|source| DecodeError::Corrupt {
                    encoding: "deflate",
                    source,
                })?;
            Ok(decoded)
        }
        "br" => {
            let mut decoder = brotli::Decompressor::new(body, 4096);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|source| DecodeError::Corrupt {
                    encoding: "br",
                    source,
                })?;
            Ok(decoded)
        }
        "" | "identity" => Ok(body.to_vec()),
        other => Err(DecodeError::Unsupported(other.to_string())),
    }
}
