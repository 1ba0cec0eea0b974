//! Migration of addresses and volumes to the side running a single instance.
//!
//! Commands are only emitted when the observed holder disagrees with the
//! decided owner, so re-running against unchanged state emits nothing.
//!
//! Volumes move in two phases across runs: a volume held by the wrong
//! instance is detached in one run and attached to the new owner in a later
//! run, once the provider reports it free.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::command::MutationCommand;
use crate::error::ConfigurationError;
use crate::model::{MirrorPair, ResourceKind, ResourceOwnershipTarget};
use crate::records::LiveState;

/// Default device name for volume attachment.
pub const DEFAULT_VOLUME_DEVICE: &str = "/dev/sdf";

/// Ownership decisions for one resource kind.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub targets: BTreeMap<String, ResourceOwnershipTarget>,
    /// Resources claimed by more than one pair. They are left out of `targets`.
    pub conflicts: Vec<ConfigurationError>,
}

impl MigrationPlan {
    /// Ids with a decided owner; only these need a live lookup.
    pub fn decided_ids(&self) -> BTreeSet<String> {
        self.targets
            .values()
            .filter(|t| t.has_decision())
            .map(|t| t.resource_id.clone())
            .collect()
    }
}

/// Plans and reconciles ownership of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceMigrator {
    Address,
    /// Volumes are detached and attached at a fixed `device`.
    Volume { device: String },
}

impl ResourceMigrator {
    pub fn address() -> Self {
        Self::Address
    }

    pub fn volume(device: impl Into<String>) -> Self {
        Self::Volume {
            device: device.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Address => ResourceKind::Address,
            Self::Volume { .. } => ResourceKind::Volume,
        }
    }

    /// Decide an owner for every resource of this kind carried by `pairs`.
    pub fn plan(&self, pairs: &[MirrorPair]) -> MigrationPlan {
        let kind = self.kind();
        let mut plan = MigrationPlan::default();
        let mut claimed_by: BTreeMap<&str, &str> = BTreeMap::new();
        let mut conflicted = BTreeSet::new();

        for pair in pairs {
            let Some(resource_id) = pair.resource_id(kind) else {
                continue;
            };

            if let Some(first) = claimed_by.get(resource_id) {
                warn!(
                    kind = %kind,
                    resource_id,
                    first = %first,
                    second = %pair.primary_name,
                    "Resource claimed by more than one pair"
                );
                plan.conflicts.push(ConfigurationError::DuplicateResourceClaim {
                    kind,
                    resource_id: resource_id.to_string(),
                    first: first.to_string(),
                    second: pair.primary_name.clone(),
                });
                conflicted.insert(resource_id);
                continue;
            }

            claimed_by.insert(resource_id, &pair.primary_name);
            plan.targets.insert(
                resource_id.to_string(),
                ResourceOwnershipTarget::for_pair(pair, resource_id),
            );
        }

        for resource_id in conflicted {
            plan.targets.remove(resource_id);
        }

        plan
    }

    /// Commands that move resources toward their decided owners.
    ///
    /// `live` maps each looked-up resource to its current holder. Resources
    /// without a decision, or missing from `live`, are left untouched.
    pub fn apply(
        &self,
        targets: &BTreeMap<String, ResourceOwnershipTarget>,
        live: &LiveState,
    ) -> Vec<MutationCommand> {
        let kind = self.kind();
        let mut commands = Vec::new();

        for target in targets.values() {
            let Some(owner) = target.owner_instance_id.as_deref() else {
                debug!(
                    kind = %kind,
                    resource_id = %target.resource_id,
                    pair = %target.pair,
                    "No side runs exactly one instance, leaving resource as is"
                );
                continue;
            };

            let Some(current) = live.get(&target.resource_id) else {
                warn!(
                    kind = %kind,
                    resource_id = %target.resource_id,
                    "Resource not reported by provider, skipping"
                );
                continue;
            };

            let command = match self {
                Self::Address => address_command(target, owner, current.as_deref()),
                Self::Volume { device } => {
                    volume_command(target, owner, current.as_deref(), device)
                }
            };
            commands.extend(command);
        }

        commands
    }
}

fn address_command(
    target: &ResourceOwnershipTarget,
    owner: &str,
    current: Option<&str>,
) -> Option<MutationCommand> {
    if current == Some(owner) {
        return None;
    }

    info!(
        allocation_id = %target.resource_id,
        instance_id = owner,
        previous = ?current,
        "Associating address"
    );
    Some(MutationCommand::AssociateAddress {
        allocation_id: target.resource_id.clone(),
        instance_id: owner.to_string(),
        allow_reassociation: true,
    })
}

/// Detach from a wrong holder, or attach once the volume reads as free.
fn volume_command(
    target: &ResourceOwnershipTarget,
    owner: &str,
    current: Option<&str>,
    device: &str,
) -> Option<MutationCommand> {
    match current {
        Some(holder) if holder == owner => None,
        Some(holder) => {
            info!(
                volume_id = %target.resource_id,
                instance_id = holder,
                next_owner = owner,
                "Detaching volume"
            );
            Some(MutationCommand::DetachVolume {
                volume_id: target.resource_id.clone(),
                instance_id: holder.to_string(),
                device: device.to_string(),
            })
        }
        None => {
            info!(
                volume_id = %target.resource_id,
                instance_id = owner,
                "Attaching volume"
            );
            Some(MutationCommand::AttachVolume {
                volume_id: target.resource_id.clone(),
                instance_id: owner.to_string(),
                device: device.to_string(),
            })
        }
    }
}
