//! Periodic failover worker.
//!
//! Runs the reconciliation pass on a fixed interval. Overlapping runs are
//! impossible within one worker since passes run on a single task.

use std::time::Duration;

use fasi_reconcile::{FailoverReconciler, ReconcileResult, RunReport};
use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Worker that runs the reconciliation loop.
pub struct FailoverWorker {
    reconciler: FailoverReconciler,
    interval: Duration,
}

impl FailoverWorker {
    /// Create a new failover worker.
    pub fn new(reconciler: FailoverReconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until shutdown is signaled. The first pass starts immediately.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting failover worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_reconciliation().await {
                        error!(error = %e, "Failover reconciliation failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Failover worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single reconciliation pass.
    pub async fn run_reconciliation(&self) -> ReconcileResult<RunReport> {
        let report = self.reconciler.reconcile_once().await?;

        if !report.is_converged() {
            info!(
                issued = report.issued.len(),
                failed = report.failed.len(),
                dry_run = report.dry_run,
                "Failover reconciliation changed state"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fasi_reconcile::ReconcileSettings;
    use fasi_testing::InMemoryProvider;

    use super::*;

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_group("web", 2, &[], &[("_fasi_failover", "web-spot")]);
        provider.add_group("web-spot", 0, &[], &[]);

        let worker = FailoverWorker::new(
            FailoverReconciler::new(provider.clone(), ReconcileSettings::default()),
            Duration::from_secs(3600),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.desired_capacity("web-spot"), Some(2));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_reported() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.fail("list_groups");

        let worker = FailoverWorker::new(
            FailoverReconciler::new(provider.clone(), ReconcileSettings::default()),
            Duration::from_secs(60),
        );

        assert!(worker.run_reconciliation().await.is_err());
    }
}
