//! Temperature sensor implementations

pub mod max31855;
pub mod timeout;

pub use max31855::{decode_frame, Max31855, Max31855Reading};
pub use timeout::TimeoutSensor;
