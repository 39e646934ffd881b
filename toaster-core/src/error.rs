//! Error types for state machine operations

use crate::control::PidError;
use crate::profile::ProfileError;
use crate::traits::ActuatorFault;

/// Errors returned by [`ProfileStateMachine`](crate::scheduler::ProfileStateMachine)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MachineError {
    /// The controller rejected an input or was not ready
    #[error("pid controller: {0}")]
    Pid(#[from] PidError),
    /// The actuator could not be driven
    #[error("actuator: {0}")]
    Actuator(#[from] ActuatorFault),
    /// The step list is unusable
    #[error("profile: {0}")]
    Profile(#[from] ProfileError),
    /// A loop setting was out of range
    #[error("{name} out of range (got {value})")]
    InvalidSetting { name: &'static str, value: f64 },
}

/// Result alias for state machine operations
pub type Result<T> = core::result::Result<T, MachineError>;
