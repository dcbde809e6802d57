//! Single-attempt upstream forwarding with cookie threading.
//!
//! One `send` call issues exactly one HTTPS request: it attaches the current
//! cookie header from the shared store, pins `Accept-Encoding`, and on
//! response absorbs every `Set-Cookie` into the store before the body is
//! interpreted at all — a challenge page still carries session cookies that
//! later retries must present.

use std::sync::Arc;

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method};
use thiserror::Error;
use url::Url;

use crate::cookies::CookieStore;
use crate::upstream::client::{TransportError, UpstreamHttpClient};
use crate::upstream::encoding::{decompress, DecodeError};

/// Default outbound `Accept-Encoding`. Identity keeps upstream bodies
/// inspectable; compressed variants are still decoded if the upstream
/// ignores the hint.
const DEFAULT_ACCEPT_ENCODING: &str = "identity";

/// Failure of one forward attempt.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Network(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Materialized upstream response with the body decoded to text.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Issues single upstream requests on behalf of the retrying relay.
pub struct RawForwarder {
    client: Arc<dyn UpstreamHttpClient>,
    cookies: CookieStore,
    accept_encoding: String,
}

impl RawForwarder {
    pub fn new(client: Arc<dyn UpstreamHttpClient>, cookies: CookieStore) -> Self {
        Self {
            client,
            cookies,
            accept_encoding: DEFAULT_ACCEPT_ENCODING.to_string(),
        }
    }

    /// Override the pinned `Accept-Encoding` value.
    pub fn with_accept_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.accept_encoding = encoding.into();
        self
    }

    /// Perform one upstream exchange.
    pub async fn send(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<ForwardResponse, ForwardError> {
        let mut outbound = headers.clone();
        if let Ok(value) = HeaderValue::from_str(&self.accept_encoding) {
            outbound.insert(ACCEPT_ENCODING, value);
        }

        // Empty cookie jar means no header at all, never an empty value.
        let cookie_header = self.cookies.cookie_header_for(url);
        if cookie_header.is_empty() {
            outbound.remove(COOKIE);
        } else if let Ok(value) = HeaderValue::from_str(&cookie_header) {
            outbound.insert(COOKIE, value);
        }

        log::debug!("forwarding {method} {url}");
        let raw = self.client.send(method, url, &outbound, body).await?;

        let set_cookie_lines: Vec<&str> = raw
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !set_cookie_lines.is_empty() {
            log::debug!("absorbing {} upstream cookie(s)", set_cookie_lines.len());
            self.cookies.absorb(set_cookie_lines, url);
        }

        let encoding = raw
            .headers
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let decoded = decompress(&raw.body, &encoding)?;
        let body_text = String::from_utf8_lossy(&decoded).into_owned();

        log::debug!(
            "upstream responded: status={} encoding={:?} bytes={}",
            raw.status,
            encoding,
            body_text.len()
        );

        Ok(ForwardResponse {
            status: raw.status,
            headers: raw.headers,
            body: body_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::client::RawResponse;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;

    /// Records outbound headers and replays canned responses.
    struct StubClient {
        responses: Mutex<Vec<RawResponse>>,
        seen_headers: Mutex<Vec<HeaderMap>>,
    }

    impl StubClient {
        fn new(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                seen_headers: Mutex::new(Vec::new()),
            })
        }

        fn last_headers(&self) -> HeaderMap {
            self.seen_headers.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl UpstreamHttpClient for StubClient {
        async fn send(
            &self,
            _method: &Method,
            _url: &Url,
            headers: &HeaderMap,
            _body: Option<&[u8]>,
        ) -> Result<RawResponse, TransportError> {
            self.seen_headers.lock().unwrap().push(headers.clone());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .expect("no more stub responses"))
        }
    }

    fn plain_response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn api_url() -> Url {
        Url::parse("https://upstream.example/v1/messages").unwrap()
    }

    #[tokio::test]
    async fn pins_accept_encoding_and_omits_empty_cookie() {
        let client = StubClient::new(vec![plain_response(200, "{}")]);
        let forwarder = RawForwarder::new(client.clone(), CookieStore::new());

        forwarder
            .send(&api_url(), &Method::POST, &HeaderMap::new(), None)
            .await
            .unwrap();

        let sent = client.last_headers();
        assert_eq!(sent.get(ACCEPT_ENCODING).unwrap(), "identity");
        assert!(sent.get(COOKIE).is_none());
    }

    #[tokio::test]
    async fn attaches_stored_cookies() {
        let cookies = CookieStore::new();
        cookies.set("acw_sc__v2", "solved", None, "/", &api_url());

        let client = StubClient::new(vec![plain_response(200, "{}")]);
        let forwarder = RawForwarder::new(client.clone(), cookies);

        forwarder
            .send(&api_url(), &Method::POST, &HeaderMap::new(), None)
            .await
            .unwrap();

        assert_eq!(client.last_headers().get(COOKIE).unwrap(), "acw_sc__v2=solved");
    }

    #[tokio::test]
    async fn absorbs_set_cookie_before_returning() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "trace=abc; Path=/".parse().unwrap());
        headers.append(SET_COOKIE, "session=def; Max-Age=60".parse().unwrap());
        let challenge_body = "var arg1='AB'; acw_sc__v2";

        let cookies = CookieStore::new();
        let client = StubClient::new(vec![RawResponse {
            status: 200,
            headers,
            body: challenge_body.as_bytes().to_vec(),
        }]);
        let forwarder = RawForwarder::new(client, cookies.clone());

        forwarder
            .send(&api_url(), &Method::POST, &HeaderMap::new(), None)
            .await
            .unwrap();

        let header = cookies.cookie_header_for(&api_url());
        assert!(header.contains("trace=abc"));
        assert!(header.contains("session=def"));
    }

    #[tokio::test]
    async fn decodes_gzip_body_when_upstream_ignores_hint() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"{\"ok\":true}").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, "gzip".parse().unwrap());

        let client = StubClient::new(vec![RawResponse {
            status: 200,
            headers,
            body: compressed,
        }]);
        let forwarder = RawForwarder::new(client, CookieStore::new());

        let response = forwarder
            .send(&api_url(), &Method::POST, &HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(response.body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn corrupt_encoding_surfaces_decode_error() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, "gzip".parse().unwrap());

        let client = StubClient::new(vec![RawResponse {
            status: 200,
            headers,
            body: b"not gzip at all".to_vec(),
        }]);
        let forwarder = RawForwarder::new(client, CookieStore::new());

        let err = forwarder
            .send(&api_url(), &Method::POST, &HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Decode(_)));
    }
}
