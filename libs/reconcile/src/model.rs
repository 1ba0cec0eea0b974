//! In-memory model for a single reconciliation run.
//!
//! Everything here is built from a fresh provider snapshot and dropped at the
//! end of the run. Nothing is shared between runs.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigurationError;
use crate::records::{GroupRecord, TagRecord};

/// Reference to a running compute instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceRef {
    pub instance_id: String,
}

impl InstanceRef {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.instance_id)
    }
}

/// Tags of a group, keyed by tag key.
///
/// Every value seen for a key is kept so that duplicate keys can be rejected
/// instead of silently picking one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    values: BTreeMap<String, Vec<String>>,
}

impl TagSet {
    /// Build a tag set from provider tag records, in provider order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TagRecord>) -> Self {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for tag in records {
            values
                .entry(tag.key.clone())
                .or_default()
                .push(tag.value.clone());
        }
        Self { values }
    }

    /// Look up a tag that must appear at most once.
    ///
    /// Empty values count as absent.
    pub fn single(&self, group: &str, key: &str) -> Result<Option<&str>, ConfigurationError> {
        match self.values.get(key).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([value]) => Ok(Some(value.as_str()).filter(|v| !v.trim().is_empty())),
            Some(values) => Err(ConfigurationError::DuplicateTag {
                group: group.to_string(),
                key: key.to_string(),
                count: values.len(),
            }),
        }
    }

    /// Returns true if the key is present, whatever its value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// A compute group as fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub name: String,
    pub desired_capacity: u32,
    pub instances: Vec<InstanceRef>,
    pub tags: TagSet,
}

impl From<GroupRecord> for GroupSnapshot {
    fn from(record: GroupRecord) -> Self {
        let tags = TagSet::from_records(&record.tags);
        Self {
            name: record.auto_scaling_group_name,
            desired_capacity: record.desired_capacity,
            instances: record
                .instances
                .into_iter()
                .map(|i| InstanceRef::new(i.instance_id))
                .collect(),
            tags,
        }
    }
}

/// Kind of resource that follows the side running a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// Floating network address (elastic IP allocation).
    Address,
    /// Attachable block volume.
    Volume,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Volume => "volume",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primary group linked to its failover group.
///
/// All fields are set explicitly by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPair {
    pub primary_name: String,
    pub failover_name: String,
    pub primary_desired: u32,
    pub failover_desired: u32,
    pub primary_instances: Vec<InstanceRef>,
    pub failover_instances: Vec<InstanceRef>,
    pub address_id: Option<String>,
    pub volume_id: Option<String>,
}

impl MirrorPair {
    /// Link a primary snapshot with its failover snapshot. Resources are unset.
    pub fn new(primary: &GroupSnapshot, failover: &GroupSnapshot) -> Self {
        Self {
            primary_name: primary.name.clone(),
            failover_name: failover.name.clone(),
            primary_desired: primary.desired_capacity,
            failover_desired: failover.desired_capacity,
            primary_instances: primary.instances.clone(),
            failover_instances: failover.instances.clone(),
            address_id: None,
            volume_id: None,
        }
    }

    /// The managed resource id of the given kind, if any.
    pub fn resource_id(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::Address => self.address_id.as_deref(),
            ResourceKind::Volume => self.volume_id.as_deref(),
        }
    }

    /// The instance that should own this pair's resources.
    ///
    /// The primary's sole instance wins, then the failover's sole instance.
    /// Zero or several instances on a side never yield an owner.
    pub fn sole_owner(&self) -> Option<&InstanceRef> {
        match (
            self.primary_instances.as_slice(),
            self.failover_instances.as_slice(),
        ) {
            ([only], _) => Some(only),
            (_, [only]) => Some(only),
            _ => None,
        }
    }
}

/// Which instance should own a resource right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOwnershipTarget {
    pub resource_id: String,
    /// `None` when neither side runs exactly one instance.
    pub owner_instance_id: Option<String>,
    /// Primary group of the pair that manages the resource.
    pub pair: String,
}

impl ResourceOwnershipTarget {
    pub fn for_pair(pair: &MirrorPair, resource_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            owner_instance_id: pair.sole_owner().map(|i| i.instance_id.clone()),
            pair: pair.primary_name.clone(),
        }
    }

    pub fn has_decision(&self) -> bool {
        self.owner_instance_id.is_some()
    }
}
