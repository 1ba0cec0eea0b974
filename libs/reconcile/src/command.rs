//! Mutations decided by the reconcilers.

use std::fmt;

/// Change the desired capacity of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleCommand {
    pub group: String,
    pub desired_capacity: u32,
    pub honor_cooldown: bool,
}

/// A single provider mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCommand {
    Scale(ScaleCommand),

    /// Associate an address with an instance, taking it from any prior holder.
    AssociateAddress {
        allocation_id: String,
        instance_id: String,
        allow_reassociation: bool,
    },

    DetachVolume {
        volume_id: String,
        instance_id: String,
        device: String,
    },

    AttachVolume {
        volume_id: String,
        instance_id: String,
        device: String,
    },
}

impl MutationCommand {
    /// Name of the provider operation that carries out this command.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Scale(_) => "set_desired_capacity",
            Self::AssociateAddress { .. } => "associate_address",
            Self::DetachVolume { .. } => "detach_volume",
            Self::AttachVolume { .. } => "attach_volume",
        }
    }
}

impl From<ScaleCommand> for MutationCommand {
    fn from(cmd: ScaleCommand) -> Self {
        Self::Scale(cmd)
    }
}

impl fmt::Display for MutationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale(cmd) => write!(
                f,
                "scale {} to {} (honor_cooldown={})",
                cmd.group, cmd.desired_capacity, cmd.honor_cooldown
            ),
            Self::AssociateAddress {
                allocation_id,
                instance_id,
                ..
            } => write!(f, "associate {allocation_id} with {instance_id}"),
            Self::DetachVolume {
                volume_id,
                instance_id,
                device,
            } => write!(f, "detach {volume_id} from {instance_id} at {device}"),
            Self::AttachVolume {
                volume_id,
                instance_id,
                device,
            } => write!(f, "attach {volume_id} to {instance_id} at {device}"),
        }
    }
}
