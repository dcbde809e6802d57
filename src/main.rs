//! Gateway binary: wire the relay together and serve.

use std::sync::Arc;

use wafrelay::config::GatewayConfig;
use wafrelay::cookies::CookieStore;
use wafrelay::relay::WafRelay;
use wafrelay::server::{router, AppState};
use wafrelay::upstream::{RawForwarder, ReqwestUpstreamClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GatewayConfig::from_env()?;

    let cookies = CookieStore::new();
    let client = Arc::new(ReqwestUpstreamClient::new()?);
    let forwarder = RawForwarder::new(client, cookies.clone());
    let relay = WafRelay::new(forwarder, cookies.clone()).with_max_retries(config.max_retries);

    let state = AppState::new(relay, cookies, config.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("wafrelay {} listening on port {}", wafrelay::VERSION, config.port);
    log::info!("forwarding to {}", config.upstream_url);
    log::info!("challenge retry budget: {}", config.max_retries);

    axum::serve(listener, app).await?;
    Ok(())
}
