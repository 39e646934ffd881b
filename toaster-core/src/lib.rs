//! Board-agnostic core logic for the Toaster reflow controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (temperature sensor, binary actuator)
//! - PID feedback controller
//! - Reflow profile model and step classification
//! - Run status machine and the per-tick profile executor
//! - Sensor fault history and abort policy
//! - Configuration types and TOML persistence
//! - Live run snapshots for UI/telemetry readers

#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod error;
pub mod profile;
pub mod safety;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod traits;

pub use error::{MachineError, Result};
