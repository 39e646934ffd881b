//! Safety monitoring
//!
//! Tracks sensor faults and decides when a run must be aborted.

pub mod monitor;

pub use monitor::{
    FaultHistory, FaultKind, SafetyStatus, SensorFaultPolicy, DEFAULT_FAULT_THRESHOLD,
    FAULT_HISTORY_LEN,
};
