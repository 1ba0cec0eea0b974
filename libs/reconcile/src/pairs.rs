//! Discovery of primary/failover pairs from group tags.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::ConfigurationError;
use crate::model::{GroupSnapshot, MirrorPair};
use crate::report::Diagnostic;

pub const DEFAULT_FAILOVER_TAG: &str = "_fasi_failover";
pub const DEFAULT_ADDRESS_TAG: &str = "_fasi_elastic_ip";
pub const DEFAULT_VOLUME_TAG: &str = "_fasi_ebs";

/// Tag keys recognized on primary groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKeys {
    pub failover: String,
    pub address: String,
    pub volume: String,
}

impl Default for TagKeys {
    fn default() -> Self {
        Self {
            failover: DEFAULT_FAILOVER_TAG.to_string(),
            address: DEFAULT_ADDRESS_TAG.to_string(),
            volume: DEFAULT_VOLUME_TAG.to_string(),
        }
    }
}

/// Pairs found in a catalog plus the groups that had to be dropped.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub pairs: Vec<MirrorPair>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds mirror pairs from groups tagged with a failover target.
#[derive(Debug, Clone, Default)]
pub struct PairResolver {
    keys: TagKeys,
}

impl PairResolver {
    pub fn new(keys: TagKeys) -> Self {
        Self { keys }
    }

    /// Resolve every tagged group in `catalog`, in group-name order.
    pub fn resolve(&self, catalog: &BTreeMap<String, GroupSnapshot>) -> Resolution {
        let mut resolution = Resolution::default();

        for group in catalog.values() {
            match self.resolve_group(group, catalog) {
                Ok(Some(pair)) => {
                    debug!(
                        primary = %pair.primary_name,
                        failover = %pair.failover_name,
                        address_id = ?pair.address_id,
                        volume_id = ?pair.volume_id,
                        "Resolved mirror pair"
                    );
                    resolution.pairs.push(pair);
                }
                Ok(None) => {}
                Err(diagnostic) => {
                    warn!(group = %group.name, diagnostic = ?diagnostic, "Dropping group");
                    resolution.diagnostics.push(diagnostic);
                }
            }
        }

        resolution
    }

    fn resolve_group(
        &self,
        group: &GroupSnapshot,
        catalog: &BTreeMap<String, GroupSnapshot>,
    ) -> Result<Option<MirrorPair>, Diagnostic> {
        let Some(failover_name) = group.tags.single(&group.name, &self.keys.failover)? else {
            if group.tags.contains(&self.keys.failover) {
                // A blank target never resolves.
                return Err(Diagnostic::MissingFailoverTarget {
                    primary: group.name.clone(),
                    failover: String::new(),
                });
            }
            return Ok(None);
        };

        if failover_name == group.name {
            return Err(ConfigurationError::SelfFailover {
                group: group.name.clone(),
            }
            .into());
        }

        let Some(failover) = catalog.get(failover_name) else {
            return Err(Diagnostic::MissingFailoverTarget {
                primary: group.name.clone(),
                failover: failover_name.to_string(),
            });
        };

        let mut pair = MirrorPair::new(group, failover);
        pair.address_id = group
            .tags
            .single(&group.name, &self.keys.address)?
            .map(str::to_string);
        pair.volume_id = group
            .tags
            .single(&group.name, &self.keys.volume)?
            .map(str::to_string);

        Ok(Some(pair))
    }
}
