//! Retrying forward pipeline.
//!
//! Orchestrates up to a fixed budget of upstream attempts for one client
//! request. Each attempt goes through the raw forwarder; a 200 response
//! carrying both challenge markers is solved inline, the derived session
//! cookie installed, and the identical request replayed with the new cookie
//! attached. Attempts are strictly sequential.

use http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use crate::challenge::{is_waf_challenge, solve_challenge, SESSION_COOKIE_NAME};
use crate::cookies::CookieStore;
use crate::upstream::{ForwardError, ForwardResponse, RawForwarder};

/// Default retry budget, matching the WAF's observed one-challenge cadence
/// with headroom.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Lifetime granted to a freshly solved challenge cookie.
const SOLVED_COOKIE_TTL_SECS: i64 = 3600;

/// Relay failure after the forward pipeline gave up.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Every attempt within the budget came back as a challenge page.
    #[error("WAF challenge persisted through {attempts} attempt(s)")]
    RetriesExceeded { attempts: usize },
    /// Transport or decode failure from an individual attempt; never
    /// recovered locally.
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Stateless orchestrator over a shared forwarder and cookie store.
pub struct WafRelay {
    forwarder: RawForwarder,
    cookies: CookieStore,
    max_retries: usize,
}

impl WafRelay {
    pub fn new(forwarder: RawForwarder, cookies: CookieStore) -> Self {
        Self {
            forwarder,
            cookies,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Forward a request, transparently solving challenge interceptions.
    ///
    /// Returns the first non-challenge response (which may be attempt one
    /// when no challenge is pending). A challenge page that yields no
    /// decodable token is returned as-is for the caller to surface; a
    /// challenge on every attempt exhausts the budget and fails with
    /// [`RelayError::RetriesExceeded`].
    pub async fn send(
        &self,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<ForwardResponse, RelayError> {
        for attempt in 1..=self.max_retries {
            let response = self
                .forwarder
                .send(url, &Method::POST, headers, body)
                .await?;

            if response.status != 200 || !is_waf_challenge(&response.body) {
                return Ok(response);
            }

            log::info!(
                "WAF challenge detected (attempt {attempt}/{})",
                self.max_retries
            );

            match solve_challenge(&response.body) {
                Some(cookie_value) => {
                    let expires = chrono::Utc::now()
                        + chrono::Duration::seconds(SOLVED_COOKIE_TTL_SECS);
                    self.cookies.set(
                        SESSION_COOKIE_NAME,
                        &cookie_value,
                        Some(expires),
                        "/",
                        url,
                    );
                    log::info!("WAF challenge solved, retrying with session cookie");
                }
                None => {
                    log::warn!("WAF challenge page had no decodable token");
                    return Ok(response);
                }
            }
        }

        Err(RelayError::RetriesExceeded {
            attempts: self.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::client::{RawResponse, TransportError, UpstreamHttpClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const CHALLENGE_PAGE: &str = "<html><script>\
        var arg1='05A2C1F34B7D89E6012F4A6B8C9D3E5F7A1B2C4D';\
        document.cookie='acw_sc__v2='+x(arg1);</script></html>";

    const UNDECODABLE_PAGE: &str = "<html>acw_sc__v2 challenge, arg1 scrubbed</html>";

    /// Replays a fixed script of responses and counts attempts.
    struct ScriptedClient {
        script: Mutex<Vec<RawResponse>>,
        attempts: AtomicUsize,
        repeat_last: bool,
    }

    impl ScriptedClient {
        fn new(script: Vec<RawResponse>, repeat_last: bool) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                attempts: AtomicUsize::new(0),
                repeat_last,
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamHttpClient for ScriptedClient {
        async fn send(
            &self,
            _method: &Method,
            _url: &Url,
            _headers: &HeaderMap,
            _body: Option<&[u8]>,
        ) -> Result<RawResponse, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if self.repeat_last && script.len() == 1 {
                return Ok(script[0].clone());
            }
            Ok(script.pop().expect("script exhausted"))
        }
    }

    fn page(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn relay_over(client: Arc<ScriptedClient>, cookies: CookieStore) -> WafRelay {
        let forwarder = RawForwarder::new(client, cookies.clone());
        WafRelay::new(forwarder, cookies)
    }

    fn api_url() -> Url {
        Url::parse("https://upstream.example/v1/messages").unwrap()
    }

    #[tokio::test]
    async fn persistent_challenge_exhausts_exact_budget() {
        let client = ScriptedClient::new(vec![page(200, CHALLENGE_PAGE)], true);
        let relay = relay_over(client.clone(), CookieStore::new());

        let err = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::RetriesExceeded { attempts: 3 }));
        assert_eq!(client.attempts(), 3);
    }

    #[tokio::test]
    async fn challenge_then_success_installs_cookie_and_returns_body() {
        let client = ScriptedClient::new(
            vec![
                page(200, CHALLENGE_PAGE),
                page(200, r#"{"type":"message","content":[]}"#),
            ],
            false,
        );
        let cookies = CookieStore::new();
        let relay = relay_over(client.clone(), cookies.clone());

        let response = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"type":"message","content":[]}"#);
        assert_eq!(client.attempts(), 2);
        assert_eq!(
            cookies.cookie_header_for(&api_url()),
            "acw_sc__v2=d13b616cb4a0b9a08e0240a0a4ff37f22b2da1ae"
        );
    }

    #[tokio::test]
    async fn clean_response_returns_on_first_attempt() {
        let client = ScriptedClient::new(vec![page(200, r#"{"ok":true}"#)], false);
        let relay = relay_over(client.clone(), CookieStore::new());

        let response = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap();

        assert_eq!(response.body, r#"{"ok":true}"#);
        assert_eq!(client.attempts(), 1);
    }

    #[tokio::test]
    async fn undecodable_challenge_is_returned_as_is() {
        let client = ScriptedClient::new(vec![page(200, UNDECODABLE_PAGE)], false);
        let relay = relay_over(client.clone(), CookieStore::new());

        let response = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap();

        assert_eq!(response.body, UNDECODABLE_PAGE);
        assert_eq!(client.attempts(), 1);
    }

    #[tokio::test]
    async fn non_200_challenge_lookalike_is_not_retried() {
        let client = ScriptedClient::new(vec![page(503, CHALLENGE_PAGE)], false);
        let relay = relay_over(client.clone(), CookieStore::new());

        let response = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(client.attempts(), 1);
    }

    struct FailingClient;

    #[async_trait]
    impl UpstreamHttpClient for FailingClient {
        async fn send(
            &self,
            _method: &Method,
            _url: &Url,
            _headers: &HeaderMap,
            _body: Option<&[u8]>,
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::Request("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn transport_errors_propagate_without_retry() {
        let cookies = CookieStore::new();
        let forwarder = RawForwarder::new(Arc::new(FailingClient), cookies.clone());
        let relay = WafRelay::new(forwarder, cookies);

        let err = relay
            .send(&api_url(), &HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Forward(ForwardError::Network(_))));
    }
}
