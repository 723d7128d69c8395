use anyhow::Context;
use payment_gateway::{build_router, AppState, GatewayConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    if config.paynow.integration_id.is_empty() || config.paynow.integration_key.is_empty() {
        tracing::warn!("PAYNOW_INTEGRATION_ID/PAYNOW_INTEGRATION_KEY not set; Paynow will reject requests");
    }
    if config.whatsapp.is_none() {
        info!("WhatsApp credentials not configured; messages will be logged only");
    }

    let http_client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;
    let state = AppState::new(config, http_client)?;
    let app = build_router(state);

    info!(%addr, "starting payment-gateway");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
