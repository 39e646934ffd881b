//! Feedback control

pub mod pid;

pub use pid::{PidConfig, PidConfigUpdate, PidController, PidError};
