//! Software stand-ins for the oven hardware
//!
//! [`SimulatedOven`] is a small thermal plant for running whole profiles
//! without hardware. [`ScriptedSensor`] and [`MemoryRelay`] are
//! deterministic fakes for tests.

pub mod oven;
pub mod scripted;

pub use oven::{OvenModel, SimulatedOven, SimulatedRelay, SimulatedThermocouple};
pub use scripted::{MemoryRelay, ScriptedSensor};
