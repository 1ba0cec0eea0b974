//! Single-pass failover reconciliation.
//!
//! One run fetches a fresh catalog, resolves pairs, scales failover groups
//! and then migrates addresses and volumes. Nothing carries over between
//! runs; a command that fails is simply recomputed by the next run.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::capacity::CapacityReconciler;
use crate::catalog::{GroupCatalog, DEFAULT_MAX_PAGES};
use crate::command::MutationCommand;
use crate::error::{ProviderError, ReconcileResult};
use crate::gateway::{self, ProviderGateway};
use crate::migrate::{ResourceMigrator, DEFAULT_VOLUME_DEVICE};
use crate::model::{MirrorPair, ResourceKind};
use crate::pairs::{PairResolver, TagKeys};
use crate::records::{live_addresses, live_volumes, GroupQuery, LiveState};
use crate::report::{Diagnostic, RunReport};

/// Terminal status returned by `FailoverReconciler::invoke`.
pub const RUN_FINISHED: &str = "finished";

/// Settings for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub tags: TagKeys,
    /// Device name used for every volume attach and detach.
    pub volume_device: String,
    /// Upper bound on catalog pages followed per run.
    pub max_pages: usize,
    /// Compute and report commands without sending them.
    pub dry_run: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            tags: TagKeys::default(),
            volume_device: DEFAULT_VOLUME_DEVICE.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            dry_run: false,
        }
    }
}

/// Opaque context handed over by whatever triggered the run.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub invocation_id: Option<String>,
}

/// Reconciles every primary/failover pair visible through a gateway.
pub struct FailoverReconciler {
    gateway: Arc<dyn ProviderGateway>,
    settings: ReconcileSettings,
}

impl FailoverReconciler {
    pub fn new(gateway: Arc<dyn ProviderGateway>, settings: ReconcileSettings) -> Self {
        Self { gateway, settings }
    }

    /// Entry point for triggered invocations.
    ///
    /// The event and context carry no meaning for reconciliation; they are
    /// only logged.
    #[instrument(skip(self, event, context), fields(invocation_id = ?context.invocation_id))]
    pub async fn invoke(
        &self,
        event: &serde_json::Value,
        context: &InvocationContext,
    ) -> ReconcileResult<&'static str> {
        debug!(event = %event, "Invocation received");
        self.reconcile_once().await?;
        Ok(RUN_FINISHED)
    }

    /// Run one full reconciliation pass.
    ///
    /// Fails only when the catalog cannot be fetched. Later provider failures
    /// are recorded in the report and skip just the affected scope.
    #[instrument(skip(self), fields(dry_run = self.settings.dry_run))]
    pub async fn reconcile_once(&self) -> ReconcileResult<RunReport> {
        let mut report = RunReport::new(self.settings.dry_run);

        let catalog = GroupCatalog::new(self.gateway.as_ref(), self.settings.max_pages)
            .fetch_all(&GroupQuery::default())
            .await?;
        report.groups = catalog.len();

        let resolution = PairResolver::new(self.settings.tags.clone()).resolve(&catalog);
        report.pairs = resolution.pairs.len();
        report.diagnostics.extend(resolution.diagnostics);
        let pairs = resolution.pairs;

        self.reconcile_capacity(&pairs, &mut report).await;
        self.migrate(&ResourceMigrator::address(), &pairs, &mut report).await;
        self.migrate(
            &ResourceMigrator::volume(self.settings.volume_device.clone()),
            &pairs,
            &mut report,
        )
        .await;

        report.finish();
        info!(
            groups = report.groups,
            pairs = report.pairs,
            issued = report.issued.len(),
            failed = report.failed.len(),
            diagnostics = report.diagnostics.len(),
            "Reconciliation pass complete"
        );

        Ok(report)
    }

    async fn reconcile_capacity(&self, pairs: &[MirrorPair], report: &mut RunReport) {
        for pair in pairs {
            if let Some(cmd) = CapacityReconciler.reconcile(pair) {
                info!(
                    primary = %pair.primary_name,
                    failover = %cmd.group,
                    from = pair.failover_desired,
                    to = cmd.desired_capacity,
                    "Scaling failover group"
                );
                self.issue(cmd.into(), report).await;
            }
        }
    }

    async fn migrate(
        &self,
        migrator: &ResourceMigrator,
        pairs: &[MirrorPair],
        report: &mut RunReport,
    ) {
        let kind = migrator.kind();
        let plan = migrator.plan(pairs);
        report
            .diagnostics
            .extend(plan.conflicts.iter().cloned().map(Diagnostic::from));

        let ids = plan.decided_ids();
        if ids.is_empty() {
            debug!(kind = %kind, "No resources to migrate");
            return;
        }

        let live = match self.lookup(kind, &ids).await {
            Ok(live) => live,
            Err(error) => {
                warn!(kind = %kind, error = %error, "Resource lookup failed, skipping migration");
                report.diagnostics.push(Diagnostic::Provider {
                    scope: format!("{kind} lookup"),
                    error,
                });
                return;
            }
        };

        // One at a time: an attach must never overlap a detach of the same volume.
        for cmd in migrator.apply(&plan.targets, &live) {
            self.issue(cmd, report).await;
        }
    }

    async fn lookup(
        &self,
        kind: ResourceKind,
        ids: &BTreeSet<String>,
    ) -> Result<LiveState, ProviderError> {
        let mut live = match kind {
            ResourceKind::Address => live_addresses(&self.gateway.describe_addresses(ids).await?),
            ResourceKind::Volume => live_volumes(&self.gateway.describe_volumes(ids).await?),
        };
        live.retain(|id, _| ids.contains(id));
        Ok(live)
    }

    async fn issue(&self, cmd: MutationCommand, report: &mut RunReport) {
        if self.settings.dry_run {
            info!(command = %cmd, "Dry run, not sending command");
            report.issued.push(cmd);
            return;
        }

        match gateway::execute(self.gateway.as_ref(), &cmd).await {
            Ok(()) => report.issued.push(cmd),
            Err(error) => {
                warn!(command = %cmd, error = %error, "Provider rejected command");
                report.failed.push((cmd, error));
            }
        }
    }
}
