//! Failover capacity tracking.
//!
//! The failover group's desired capacity always equals the primary's deficit:
//! zero when the primary is healthy, the exact shortfall otherwise.

use tracing::debug;

use crate::command::ScaleCommand;
use crate::model::MirrorPair;

/// Instances the primary is short of its desired capacity.
pub fn deficit(desired: u32, running: usize) -> u32 {
    let running = u32::try_from(running).unwrap_or(u32::MAX);
    desired.saturating_sub(running)
}

/// Decides failover scale targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityReconciler;

impl CapacityReconciler {
    /// Scale command for the failover group, or `None` if it already tracks
    /// the deficit.
    ///
    /// Cooldowns are never honored: failover must not wait on the primary's
    /// scaling timers.
    pub fn reconcile(&self, pair: &MirrorPair) -> Option<ScaleCommand> {
        let needed = deficit(pair.primary_desired, pair.primary_instances.len());

        if needed == pair.failover_desired {
            debug!(
                primary = %pair.primary_name,
                failover = %pair.failover_name,
                deficit = needed,
                "Failover capacity already matches deficit"
            );
            return None;
        }

        Some(ScaleCommand {
            group: pair.failover_name.clone(),
            desired_capacity: needed,
            honor_cooldown: false,
        })
    }
}
