//! Actuator implementations

pub mod gpio;

pub use gpio::GpioRelay;
