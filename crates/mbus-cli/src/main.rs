//! # mbus
//!
//! Soak runner for the in-process message bus.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings for 10 seconds
//! mbus
//!
//! # Run with a custom config
//! MBUS_CONFIG=/path/to/mbus.toml mbus
//!
//! # Evict slow consumers, run until Ctrl-C
//! MBUS_DROP_SLOW_CONSUMERS=true MBUS_RUN_SECS=0 mbus
//! ```

mod config;
mod exporter;
mod soak;

use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mbus_cli=debug,mbus_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    if config.metrics.enabled {
        if let Err(e) = exporter::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {:#}", e);
        }
    }

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted, shutting down");
                    token.cancel();
                }
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }
    if config.soak.run_secs > 0 {
        let token = token.clone();
        let run_for = Duration::from_secs(config.soak.run_secs);
        tokio::spawn(async move {
            tokio::time::sleep(run_for).await;
            token.cancel();
        });
    }

    let report = soak::run(&config, token).await?;

    info!(
        published = report.published,
        received = report.received,
        subscribed = report.subscribed,
        unsubscribed = report.unsubscribed,
        "Soak finished"
    );

    Ok(())
}
