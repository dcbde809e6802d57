//! Reqwest-backed implementation of the `UpstreamHttpClient` trait.
//!
//! A thin adapter around `reqwest::Client` behind a trait seam, so the
//! forwarder and relay can be exercised against stub clients in tests.

use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

/// Transport-level failure while talking to the upstream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream connection failed: {0}")]
    Connect(String),
    #[error("upstream request failed: {0}")]
    Request(String),
}

/// Raw bytes of one upstream exchange, before any content decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Abstraction over the HTTPS transport used for forward attempts.
#[async_trait]
pub trait UpstreamHttpClient: Send + Sync {
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<RawResponse, TransportError>;
}

/// Production client. Redirects are disabled so the caller observes WAF
/// interception pages directly, and no built-in cookie store is enabled: the
/// explicit [`crate::cookies::CookieStore`] owns the session instead.
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
}

impl ReqwestUpstreamClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. It should already have redirects
    /// disabled, otherwise intermediate 30x responses are never observed.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamHttpClient for ReqwestUpstreamClient {
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(method.clone(), url.as_str())
            .headers(headers.clone());

        if let Some(data) = body {
            builder = builder.body(data.to_vec());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
