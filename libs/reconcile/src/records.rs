//! Provider-shaped records exchanged with a `ProviderGateway`.
//!
//! Field names follow the provider API (PascalCase on the wire).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attachment states that mean a volume is (or is about to be) in use.
pub const CURRENT_ATTACHMENT_STATES: [&str; 2] = ["attached", "attaching"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagRecord {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceRecord {
    pub instance_id: String,
}

/// One compute group as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupRecord {
    pub auto_scaling_group_name: String,
    pub desired_capacity: u32,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

/// Parameters of a group listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupQuery {
    /// Restrict the listing to these names. Empty lists every group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_scaling_group_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// One page of a group listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupPage {
    #[serde(default)]
    pub auto_scaling_groups: Vec<GroupRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    /// Provider request id of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressRecord {
    pub allocation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeAttachmentRecord {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl VolumeAttachmentRecord {
    pub fn is_current(&self) -> bool {
        CURRENT_ATTACHMENT_STATES.contains(&self.state.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRecord {
    pub volume_id: String,
    #[serde(default)]
    pub attachments: Vec<VolumeAttachmentRecord>,
}

impl VolumeRecord {
    /// Instance of the first attachment that is attached or attaching.
    pub fn current_instance(&self) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.is_current())
            .and_then(|a| a.instance_id.as_deref())
    }
}

/// Observed holder of each resource: resource id to instance id.
pub type LiveState = BTreeMap<String, Option<String>>;

/// Live association of each address.
pub fn live_addresses(records: &[AddressRecord]) -> LiveState {
    records
        .iter()
        .map(|r| (r.allocation_id.clone(), r.instance_id.clone()))
        .collect()
}

/// Live attachment of each volume.
pub fn live_volumes(records: &[VolumeRecord]) -> LiveState {
    records
        .iter()
        .map(|r| (r.volume_id.clone(), r.current_instance().map(str::to_string)))
        .collect()
}
