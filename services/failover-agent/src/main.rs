//! Failover agent
//!
//! Keeps standby groups sized to their primary's instance deficit and moves
//! floating addresses and volumes to the side running a single instance.
//!
//! With `FASI_RUN_ONCE` set, performs one pass and exits (for external
//! schedulers); otherwise reconciles every `FASI_INTERVAL_SECS` until
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fasi_agent::{Config, FailoverWorker, HttpProvider};
use fasi_reconcile::{FailoverReconciler, InvocationContext};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        provider_url = %config.provider_url,
        region = %config.region,
        failover_tag = %config.tags.failover,
        volume_device = %config.volume_device,
        dry_run = config.dry_run,
        "Starting failover agent"
    );

    let provider = Arc::new(HttpProvider::new(&config)?);
    let reconciler = FailoverReconciler::new(provider, config.reconcile_settings());

    if config.run_once {
        let status = reconciler
            .invoke(&serde_json::json!({}), &InvocationContext::default())
            .await?;
        info!(status, "Single run complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = FailoverWorker::new(reconciler, Duration::from_secs(config.interval_secs));
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Failover worker panicked");
    }

    info!("Failover agent shutdown complete");
    Ok(())
}
