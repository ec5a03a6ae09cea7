//! Filtration agent - water quality analytics service
//!
//! Runs the analytics engine over an in-memory store: periodic baseline
//! refresh, filter health analysis and sensor forecasting, with anomaly
//! detection on incoming readings.

use analytics_lib::{AnalyticsService, MemoryStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting filtration-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(
        pre_device = %config.pre_device,
        post_device = %config.post_device,
        "Agent configured"
    );

    // The ingestion boundary (wire-protocol client, HTTP layer) feeds this
    // store; the analytics service only ever reads from it
    let store = Arc::new(MemoryStore::new());

    let service = AnalyticsService::new(store, config.service_config());
    service.start().await;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    service.stop().await;

    Ok(())
}
