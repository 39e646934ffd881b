//! Reflow profile model

pub mod step;

pub use step::{Profile, ProfileError, ProfileStep, StepKind};
