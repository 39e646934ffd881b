//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in toaster-core:
//!
//! - Temperature sensors (MAX31855 thermocouple, read-timeout wrapper)
//! - Actuators (GPIO relay)
//! - Simulation (first-order oven model) and scripted test fakes

#![deny(unsafe_code)]

pub mod actuator;
pub mod sensor;
pub mod sim;
