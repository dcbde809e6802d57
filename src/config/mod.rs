//! Runtime configuration, loaded from the environment.
//!
//! Three knobs cover deployment: listen port, upstream base URL, and the
//! challenge retry budget. Anything unset falls back to defaults that match
//! the reference deployment.

use std::env;

use thiserror::Error;
use url::Url;

/// Environment variable names.
const ENV_PORT: &str = "WAFRELAY_PORT";
const ENV_UPSTREAM_URL: &str = "WAFRELAY_UPSTREAM_URL";
const ENV_MAX_RETRIES: &str = "WAFRELAY_MAX_RETRIES";

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_UPSTREAM_URL: &str = "https://anyrouter.top";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} is not a valid URL: {source}")]
    BadUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

/// Resolved gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub upstream_url: Url,
    pub max_retries: usize,
}

impl GatewayConfig {
    /// Read settings from the process environment, applying defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var(ENV_PORT) {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_PORT,
                value,
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let upstream_raw =
            env::var(ENV_UPSTREAM_URL).unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = Url::parse(&upstream_raw).map_err(|source| ConfigError::BadUrl {
            name: ENV_UPSTREAM_URL,
            source,
        })?;

        let max_retries = match env::var(ENV_MAX_RETRIES) {
            Ok(value) => {
                let parsed: usize = value.parse().map_err(|_| ConfigError::Invalid {
                    name: ENV_MAX_RETRIES,
                    value,
                })?;
                parsed.max(1)
            }
            Err(_) => crate::relay::DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            port,
            upstream_url,
            max_retries,
        })
    }

    /// Full URL of the upstream completion endpoint.
    pub fn messages_endpoint(&self) -> Url {
        let mut url = self.upstream_url.clone();
        url.set_path("/v1/messages");
        url
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL).expect("default URL is valid"),
            max_retries: crate::relay::DEFAULT_MAX_RETRIES,
        }
    }
}
