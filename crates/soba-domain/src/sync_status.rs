//! Engine synchronization state surfaced on form versions and submissions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Visible "did it reach the engine" state of a business entity.
///
/// `pending` on creation / enqueue, `provisioning` while the worker is calling
/// the engine, `ready` once the engine reference is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineSyncStatus {
    Pending,
    Provisioning,
    Ready,
    Error,
}

impl EngineSyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EngineSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine sync status: {0}")]
pub struct UnknownSyncStatus(pub String);

impl FromStr for EngineSyncStatus {
    type Err = UnknownSyncStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "provisioning" => Ok(Self::Provisioning),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(UnknownSyncStatus(other.to_owned())),
        }
    }
}
