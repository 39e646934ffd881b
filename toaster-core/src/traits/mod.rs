//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic and
//! platform-specific adapters. Concrete implementations (thermocouple over
//! SPI, relay on GPIO, simulated plant) live in `toaster-drivers` and are
//! handed to the state machine at construction.

pub mod actuator;
pub mod sensor;

pub use actuator::{ActuatorFault, BinaryActuator};
pub use sensor::{SensorFault, TemperatureSensor};
