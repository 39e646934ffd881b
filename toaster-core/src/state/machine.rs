//! Run status definition
//!
//! Whether time advances, whether the heater may run and which commands
//! are accepted are all functions of the current status and an event.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::events::RunEvent;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    /// No run in progress; actuator held off
    #[default]
    Stopped,
    /// Profile executing
    Running,
    /// Execution paused by user; time frozen
    Paused,
    /// Actuator self-test in progress; step logic bypassed
    Testing,
    /// All steps completed
    Complete,
}

impl RunStatus {
    /// Check if the run clock advances in this status
    pub fn advances_time(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Testing)
    }

    /// Check if the profile executor may drive the heater
    pub fn heater_allowed(&self) -> bool {
        matches!(self, RunStatus::Running)
    }

    /// Check if a run is in flight (running or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Stopped => "Stopped",
            RunStatus::Running => "Running",
            RunStatus::Paused => "Paused",
            RunStatus::Testing => "Testing",
            RunStatus::Complete => "Complete",
        }
    }

    /// Process an event and return the next status
    pub fn transition(self, event: RunEvent) -> Self {
        use RunEvent::*;
        use RunStatus::*;

        match (self, event) {
            // A self-test must be stopped before a run can start
            (Testing, Start) => Testing,
            (_, Start) => Running,

            (_, Stop) => Stopped,

            (Running, Pause) => Paused,
            (Paused, Resume) => Running,

            (Stopped, BeginSelfTest) => Testing,

            (Running, ProfileFinished) => Complete,
            (Paused, ProfileFinished) => Complete,

            // Default: stay in current status
            _ => self,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
