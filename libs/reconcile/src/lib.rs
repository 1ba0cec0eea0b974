//! Failover reconciliation for paired compute groups.
//!
//! A primary group tagged with a failover target is mirrored by a standby
//! group. Each run:
//!
//! - **Catalog**: lists every group, following pagination to the end.
//! - **Pairs**: links tagged primaries to their failover groups, along with
//!   the address and volume ids they manage.
//! - **Capacity**: sets the failover group's desired capacity to exactly the
//!   primary's instance deficit.
//! - **Migration**: moves each address and volume to whichever side runs
//!   exactly one instance.
//!
//! # Invariants
//!
//! - Runs are stateless; every decision comes from a fresh snapshot
//! - Commands are only issued when observed state disagrees with the decision,
//!   so a run over unchanged state issues nothing
//! - A side with zero or several instances never receives a resource
//! - A volume is never detached and attached in the same run

pub mod capacity;
pub mod catalog;
pub mod command;
pub mod error;
pub mod gateway;
pub mod migrate;
pub mod model;
pub mod pairs;
pub mod records;
pub mod report;
pub mod run;

pub use capacity::{deficit, CapacityReconciler};
pub use catalog::{collect_pages, GroupCatalog, Paginated, DEFAULT_MAX_PAGES};
pub use command::{MutationCommand, ScaleCommand};
pub use error::{ConfigurationError, ProviderError, ReconcileError, ReconcileResult};
pub use gateway::ProviderGateway;
pub use migrate::{MigrationPlan, ResourceMigrator, DEFAULT_VOLUME_DEVICE};
pub use model::{
    GroupSnapshot, InstanceRef, MirrorPair, ResourceKind, ResourceOwnershipTarget, TagSet,
};
pub use pairs::{PairResolver, Resolution, TagKeys};
pub use report::{Diagnostic, RunReport};
pub use run::{FailoverReconciler, InvocationContext, ReconcileSettings, RUN_FINISHED};
