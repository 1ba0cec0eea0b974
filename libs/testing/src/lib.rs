//! Test support for failover reconciliation.
//!
//! `InMemoryProvider` is a stateful stand-in for the cloud provider:
//!
//! - Group listings are paginated with a configurable page size
//! - Mutations are recorded in call order and applied to the held state
//! - Detaches leave the volume `detaching` and attaches leave it `attaching`
//!   until `settle()` is called, mimicking provider-side completion
//! - Any operation can be made to fail by name

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use fasi_reconcile::records::{
    AddressRecord, GroupPage, GroupQuery, GroupRecord, InstanceRecord, TagRecord,
    VolumeAttachmentRecord, VolumeRecord,
};
use fasi_reconcile::{MutationCommand, ProviderError, ProviderGateway, ScaleCommand};
use tracing::debug;

#[derive(Debug, Default)]
struct ProviderState {
    groups: BTreeMap<String, GroupRecord>,
    addresses: BTreeMap<String, Option<String>>,
    volumes: BTreeMap<String, Vec<VolumeAttachmentRecord>>,
    mutations: Vec<MutationCommand>,
    failing: BTreeSet<&'static str>,
    list_calls: usize,
    lookups: Vec<(&'static str, BTreeSet<String>)>,
    endless_pages: bool,
}

/// In-memory provider for tests.
#[derive(Debug)]
pub struct InMemoryProvider {
    state: Mutex<ProviderState>,
    page_size: usize,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    /// Provider returning up to 50 groups per page.
    pub fn new() -> Self {
        Self::with_page_size(50)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(ProviderState::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().expect("provider state lock poisoned")
    }

    /// Add or replace a group.
    pub fn add_group(&self, name: &str, desired: u32, instances: &[&str], tags: &[(&str, &str)]) {
        let record = GroupRecord {
            auto_scaling_group_name: name.to_string(),
            desired_capacity: desired,
            instances: instances
                .iter()
                .map(|id| InstanceRecord {
                    instance_id: id.to_string(),
                })
                .collect(),
            tags: tags
                .iter()
                .map(|(key, value)| TagRecord {
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        };
        self.state().groups.insert(name.to_string(), record);
    }

    /// Replace the running instances of a group.
    pub fn set_instances(&self, name: &str, instances: &[&str]) {
        if let Some(group) = self.state().groups.get_mut(name) {
            group.instances = instances
                .iter()
                .map(|id| InstanceRecord {
                    instance_id: id.to_string(),
                })
                .collect();
        }
    }

    pub fn add_address(&self, allocation_id: &str, holder: Option<&str>) {
        self.state()
            .addresses
            .insert(allocation_id.to_string(), holder.map(str::to_string));
    }

    /// Add a volume, attached to `holder` if given.
    pub fn add_volume(&self, volume_id: &str, holder: Option<&str>) {
        let attachments = holder
            .map(|instance| {
                vec![VolumeAttachmentRecord {
                    state: "attached".to_string(),
                    instance_id: Some(instance.to_string()),
                }]
            })
            .unwrap_or_default();
        self.state()
            .volumes
            .insert(volume_id.to_string(), attachments);
    }

    /// Make every call to `operation` fail until `recover` is called.
    pub fn fail(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state().failing.remove(operation);
    }

    /// Always hand out another continuation token.
    pub fn paginate_forever(&self) {
        self.state().endless_pages = true;
    }

    /// Complete pending detaches and attaches.
    pub fn settle(&self) {
        for attachments in self.state().volumes.values_mut() {
            attachments.retain(|a| a.state != "detaching");
            for attachment in attachments.iter_mut() {
                if attachment.state == "attaching" {
                    attachment.state = "attached".to_string();
                }
            }
        }
    }

    pub fn desired_capacity(&self, group: &str) -> Option<u32> {
        self.state().groups.get(group).map(|g| g.desired_capacity)
    }

    pub fn address_holder(&self, allocation_id: &str) -> Option<String> {
        self.state().addresses.get(allocation_id).cloned().flatten()
    }

    /// Instance the volume is attached or attaching to.
    pub fn volume_holder(&self, volume_id: &str) -> Option<String> {
        self.state()
            .volumes
            .get(volume_id)
            .and_then(|attachments| attachments.iter().find(|a| a.is_current()))
            .and_then(|a| a.instance_id.clone())
    }

    /// Mutations received so far, in call order.
    pub fn mutations(&self) -> Vec<MutationCommand> {
        self.state().mutations.clone()
    }

    /// Drain the recorded mutations.
    pub fn take_mutations(&self) -> Vec<MutationCommand> {
        std::mem::take(&mut self.state().mutations)
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    /// Batched describe calls, as (operation, requested ids).
    pub fn lookups(&self) -> Vec<(&'static str, BTreeSet<String>)> {
        self.state().lookups.clone()
    }

    fn check(state: &ProviderState, operation: &'static str) -> Result<(), ProviderError> {
        if state.failing.contains(operation) {
            return Err(ProviderError::Request {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn rejected(operation: &'static str, body: String) -> ProviderError {
        ProviderError::Status {
            operation,
            status: 400,
            body,
        }
    }
}

#[async_trait]
impl ProviderGateway for InMemoryProvider {
    async fn list_groups(&self, query: &GroupQuery) -> Result<GroupPage, ProviderError> {
        let mut state = self.state();
        state.list_calls += 1;
        Self::check(&state, "list_groups")?;

        let offset = match query.next_token.as_deref() {
            None => 0,
            Some(token) => token
                .strip_prefix("offset-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| Self::rejected("list_groups", format!("bad token {token}")))?,
        };

        let matching: Vec<&GroupRecord> = state
            .groups
            .values()
            .filter(|g| {
                query.auto_scaling_group_names.is_empty()
                    || query
                        .auto_scaling_group_names
                        .contains(&g.auto_scaling_group_name)
            })
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let groups: Vec<GroupRecord> = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|g| (*g).clone())
            .collect();

        let next_token = if end < matching.len() || state.endless_pages {
            Some(format!("offset-{}", end.min(matching.len())))
        } else {
            None
        };

        debug!(offset, returned = groups.len(), next_token = ?next_token, "Listing groups");
        Ok(GroupPage {
            auto_scaling_groups: groups,
            next_token,
            request_id: Some(format!("req-{}", state.list_calls)),
        })
    }

    async fn set_desired_capacity(
        &self,
        group_name: &str,
        desired_capacity: u32,
        honor_cooldown: bool,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        Self::check(&state, "set_desired_capacity")?;
        state.mutations.push(MutationCommand::Scale(ScaleCommand {
            group: group_name.to_string(),
            desired_capacity,
            honor_cooldown,
        }));

        let group = state.groups.get_mut(group_name).ok_or_else(|| {
            Self::rejected("set_desired_capacity", format!("no group {group_name}"))
        })?;
        group.desired_capacity = desired_capacity;
        Ok(())
    }

    async fn describe_addresses(
        &self,
        allocation_ids: &BTreeSet<String>,
    ) -> Result<Vec<AddressRecord>, ProviderError> {
        let mut state = self.state();
        state
            .lookups
            .push(("describe_addresses", allocation_ids.clone()));
        Self::check(&state, "describe_addresses")?;

        Ok(state
            .addresses
            .iter()
            .filter(|(id, _)| allocation_ids.contains(*id))
            .map(|(id, holder)| AddressRecord {
                allocation_id: id.clone(),
                instance_id: holder.clone(),
            })
            .collect())
    }

    async fn associate_address(
        &self,
        instance_id: &str,
        allocation_id: &str,
        allow_reassociation: bool,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        Self::check(&state, "associate_address")?;
        state.mutations.push(MutationCommand::AssociateAddress {
            allocation_id: allocation_id.to_string(),
            instance_id: instance_id.to_string(),
            allow_reassociation,
        });

        let holder = state.addresses.get_mut(allocation_id).ok_or_else(|| {
            Self::rejected("associate_address", format!("no address {allocation_id}"))
        })?;
        if holder.is_some() && !allow_reassociation {
            return Err(Self::rejected(
                "associate_address",
                format!("{allocation_id} is already associated"),
            ));
        }
        *holder = Some(instance_id.to_string());
        Ok(())
    }

    async fn describe_volumes(
        &self,
        volume_ids: &BTreeSet<String>,
    ) -> Result<Vec<VolumeRecord>, ProviderError> {
        let mut state = self.state();
        state.lookups.push(("describe_volumes", volume_ids.clone()));
        Self::check(&state, "describe_volumes")?;

        Ok(state
            .volumes
            .iter()
            .filter(|(id, _)| volume_ids.contains(*id))
            .map(|(id, attachments)| VolumeRecord {
                volume_id: id.clone(),
                attachments: attachments.clone(),
            })
            .collect())
    }

    async fn detach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        Self::check(&state, "detach_volume")?;
        state.mutations.push(MutationCommand::DetachVolume {
            volume_id: volume_id.to_string(),
            instance_id: instance_id.to_string(),
            device: device.to_string(),
        });

        let attachment = state
            .volumes
            .get_mut(volume_id)
            .and_then(|attachments| {
                attachments
                    .iter_mut()
                    .find(|a| a.is_current() && a.instance_id.as_deref() == Some(instance_id))
            })
            .ok_or_else(|| {
                Self::rejected(
                    "detach_volume",
                    format!("{volume_id} is not attached to {instance_id}"),
                )
            })?;
        attachment.state = "detaching".to_string();
        Ok(())
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        Self::check(&state, "attach_volume")?;
        state.mutations.push(MutationCommand::AttachVolume {
            volume_id: volume_id.to_string(),
            instance_id: instance_id.to_string(),
            device: device.to_string(),
        });

        let attachments = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| Self::rejected("attach_volume", format!("no volume {volume_id}")))?;
        if attachments.iter().any(|a| a.state != "detached") {
            return Err(Self::rejected(
                "attach_volume",
                format!("{volume_id} is in use"),
            ));
        }
        attachments.push(VolumeAttachmentRecord {
            state: "attaching".to_string(),
            instance_id: Some(instance_id.to_string()),
        });
        Ok(())
    }
}
