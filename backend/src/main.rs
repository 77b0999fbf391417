use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod amount;
mod api;
mod config;
mod error;
mod gateway_client;
mod health;
mod probe;
mod registry;
#[cfg(test)]
mod testing;
mod types;
mod views;

use crate::{
    api::AppState,
    config::Config,
    gateway_client::{Gateway, GatewayClient},
    health::{HealthMonitor, HealthPoller},
    probe::{FallbackProbe, SentinelNameMatch},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🚀 Starting console backend...");

    let config = Config::from_env()?;

    tracing::info!("🔗 Gateway at {}", config.gateway_url);
    let gateway: Arc<dyn Gateway> = Arc::new(GatewayClient::new(&config.gateway_url, &config.http)?);

    if config.registry.is_empty() {
        tracing::warn!("No health targets registered, health checks will report nothing");
    } else {
        tracing::info!(
            "🩺 {} health targets registered",
            config.registry.len()
        );
    }
    let poller = HealthPoller::new(config.registry.clone());
    let probe = FallbackProbe::new(SentinelNameMatch::new(&config.fallback_sentinel));

    let mut state = AppState::new(gateway.clone(), probe, poller);
    if let Some(period) = config.health_poll_interval {
        let monitor = HealthMonitor::spawn(state.health.clone(), gateway, period);
        state = state.with_monitor(monitor);
    }

    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
