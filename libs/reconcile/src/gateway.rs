//! Provider capability boundary.
//!
//! One method per provider operation. Implementations own transport,
//! credentials, retries and timeouts; the reconcilers only decide.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::command::MutationCommand;
use crate::error::ProviderError;
use crate::records::{AddressRecord, GroupPage, GroupQuery, VolumeRecord};

/// Cloud provider operations consumed by the reconcilers.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Fetch one page of compute groups.
    async fn list_groups(&self, query: &GroupQuery) -> Result<GroupPage, ProviderError>;

    async fn set_desired_capacity(
        &self,
        group_name: &str,
        desired_capacity: u32,
        honor_cooldown: bool,
    ) -> Result<(), ProviderError>;

    async fn describe_addresses(
        &self,
        allocation_ids: &BTreeSet<String>,
    ) -> Result<Vec<AddressRecord>, ProviderError>;

    async fn associate_address(
        &self,
        instance_id: &str,
        allocation_id: &str,
        allow_reassociation: bool,
    ) -> Result<(), ProviderError>;

    async fn describe_volumes(
        &self,
        volume_ids: &BTreeSet<String>,
    ) -> Result<Vec<VolumeRecord>, ProviderError>;

    async fn detach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError>;

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError>;
}

/// Carry out a command through the gateway.
pub async fn execute(
    gateway: &dyn ProviderGateway,
    command: &MutationCommand,
) -> Result<(), ProviderError> {
    match command {
        MutationCommand::Scale(cmd) => {
            gateway
                .set_desired_capacity(&cmd.group, cmd.desired_capacity, cmd.honor_cooldown)
                .await
        }
        MutationCommand::AssociateAddress {
            allocation_id,
            instance_id,
            allow_reassociation,
        } => {
            gateway
                .associate_address(instance_id, allocation_id, *allow_reassociation)
                .await
        }
        MutationCommand::DetachVolume {
            volume_id,
            instance_id,
            device,
        } => gateway.detach_volume(instance_id, volume_id, device).await,
        MutationCommand::AttachVolume {
            volume_id,
            instance_id,
            device,
        } => gateway.attach_volume(instance_id, volume_id, device).await,
    }
}
