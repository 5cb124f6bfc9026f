//! Contracts shared by the external capture collaborators.

use serde::{Deserialize, Serialize};

/// Readiness reported by a device driver. Lifecycle events (connect,
/// disconnect, arm sync) only ever touch this flag, never the signal math.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub connected: bool,
    pub synced: bool,
}

impl LinkStatus {
    pub const DOWN: LinkStatus = LinkStatus {
        connected: false,
        synced: false,
    };

    pub const READY: LinkStatus = LinkStatus {
        connected: true,
        synced: true,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("device not connected")]
    Disconnected,
    #[error("device read failed: {0}")]
    Read(String),
}

/// Which producer loop a status or rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    Emg,
    Camera,
}
