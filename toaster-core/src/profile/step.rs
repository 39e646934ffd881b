//! Reflow profile steps
//!
//! A profile is an ordered list of named steps. Each step is classified when
//! it is entered, relative to the previous step's target:
//!
//! - Ramp: the target differs, the step ends when the measured temperature
//!   crosses the target.
//! - Soak: the target is unchanged, the step ends when its duration elapses.

use serde::{Deserialize, Serialize};

/// Profile validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    /// A profile needs at least one step
    #[error("profile has no steps")]
    Empty,
    /// Step names identify steps in the sample log
    #[error("duplicate step name `{0}`")]
    DuplicateStep(String),
    /// Target must be a finite temperature
    #[error("step `{0}` has a non-finite target")]
    InvalidTarget(String),
    /// Duration must be finite and non-negative
    #[error("step `{0}` has an invalid duration")]
    InvalidDuration(String),
}

/// A single named profile step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStep {
    /// Step name, unique within a profile
    pub name: String,
    /// Target temperature in display units
    pub target: f64,
    /// Duration in seconds (only used by soak steps)
    #[serde(default)]
    pub duration: f64,
}

impl ProfileStep {
    /// Create a step
    pub fn new(name: impl Into<String>, target: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            target,
            duration,
        }
    }
}

/// How a step decides it is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Temperature-bounded
    Ramp,
    /// Duration-bounded
    Soak,
}

impl StepKind {
    /// Classify a step from the previous target and its own target
    pub fn classify(previous_target: f64, target: f64) -> Self {
        if target == previous_target {
            StepKind::Soak
        } else {
            StepKind::Ramp
        }
    }

    /// Short name for display
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Ramp => "ramp",
            StepKind::Soak => "soak",
        }
    }
}

/// Validated, ordered list of steps
///
/// Immutable once built; a run never sees the step list change.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    steps: Vec<ProfileStep>,
}

impl Profile {
    /// Build a profile, rejecting empty lists, duplicate names and
    /// non-finite values
    pub fn new(steps: Vec<ProfileStep>) -> Result<Self, ProfileError> {
        if steps.is_empty() {
            return Err(ProfileError::Empty);
        }

        for (i, step) in steps.iter().enumerate() {
            if !step.target.is_finite() {
                return Err(ProfileError::InvalidTarget(step.name.clone()));
            }
            if !step.duration.is_finite() || step.duration < 0.0 {
                return Err(ProfileError::InvalidDuration(step.name.clone()));
            }
            if steps[..i].iter().any(|s| s.name == step.name) {
                return Err(ProfileError::DuplicateStep(step.name.clone()));
            }
        }

        Ok(Self { steps })
    }

    /// All steps in order
    pub fn steps(&self) -> &[ProfileStep] {
        &self.steps
    }

    /// Step at `index`
    pub fn get(&self, index: usize) -> Option<&ProfileStep> {
        self.steps.get(index)
    }

    /// Number of steps (never zero)
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if `index` is the final (cooldown) step
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    /// Classification of every step, starting from `initial_target`
    pub fn kinds(&self, initial_target: f64) -> Vec<StepKind> {
        let mut previous = initial_target;
        self.steps
            .iter()
            .map(|step| {
                let kind = StepKind::classify(previous, step.target);
                previous = step.target;
                kind
            })
            .collect()
    }

    /// Sum of all soak durations, ignoring ramp time
    pub fn soak_time(&self, initial_target: f64) -> f64 {
        self.steps
            .iter()
            .zip(self.kinds(initial_target))
            .filter(|(_, kind)| *kind == StepKind::Soak)
            .map(|(step, _)| step.duration)
            .sum()
    }
}
