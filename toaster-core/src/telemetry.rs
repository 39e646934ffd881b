//! Live run snapshots
//!
//! The control loop owns the state machine exclusively. Readers on other
//! threads (UI, telemetry link) see a copy published once per tick through
//! a [`SnapshotCell`].

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::state::RunStatus;

/// Observable state of a run at one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Name of the active step
    pub step: String,
    pub step_index: usize,
    /// Run time in seconds
    pub timestamp: f64,
    /// Measured temperature in display units
    pub temperature: f64,
    /// Cold-junction temperature in degrees Celsius
    pub reference_temperature: f64,
    /// Active target in display units
    pub target: f64,
    pub actuator_on: bool,
    pub pid_output: f64,
    /// Failed reads among the last ten
    pub recent_error_count: usize,
}

impl RunSnapshot {
    /// Encode for a telemetry link
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decode a snapshot produced by [`RunSnapshot::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Shared handle to the latest snapshot
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<RunSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published snapshot
    pub fn publish(&self, snapshot: RunSnapshot) {
        // A panicked writer never leaves a half-written snapshot behind
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = snapshot;
    }

    /// Copy of the latest snapshot
    pub fn latest(&self) -> RunSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
