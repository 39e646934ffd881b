//! Configuration type definitions
//!
//! These types represent the controller configuration as stored in a TOML
//! document. Every section and key is optional; absent keys take the
//! reference tuning.

use serde::{Deserialize, Serialize};

use super::units::TemperatureUnit;
use crate::control::PidConfig;
use crate::profile::ProfileStep;
use crate::safety::{DEFAULT_FAULT_THRESHOLD, FAULT_HISTORY_LEN};

/// Default control tick period in seconds
pub const DEFAULT_TIMER_PERIOD: f64 = 0.5;

/// Default ramp completion buffer in degrees Celsius
pub const DEFAULT_STEP_TOLERANCE: f64 = 3.0;

/// Hardware pin assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Thermocouple chip select (0 or 1)
    pub spi_cs: u8,
    /// Relay GPIO line
    pub relay: u8,
    /// Relay is energized by driving the line high
    pub relay_active_high: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            spi_cs: 0,
            relay: 4,
            relay_active_high: true,
        }
    }
}

/// Control loop tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Seconds between ticks
    pub timer_period: f64,
    /// Failed reads (out of the last ten) that abort a run
    pub fault_threshold: usize,
    /// Ramp completion buffer in degrees Celsius
    pub step_tolerance: f64,
    /// PID tunables
    pub pid: PidConfig,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            timer_period: DEFAULT_TIMER_PERIOD,
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            pid: PidConfig::default(),
        }
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToasterConfig {
    /// Display unit for targets and samples
    pub units: TemperatureUnit,
    /// Pin assignment
    pub pins: PinConfig,
    /// Loop tuning
    pub tuning: TuningConfig,
    /// Ordered profile steps
    pub steps: Vec<ProfileStep>,
}

/// Reasons a configuration is rejected after parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidConfig {
    #[error("timer period must be a positive number of seconds (got {0})")]
    TimerPeriod(f64),
    #[error("spi chip select must be 0 or 1 (got {0})")]
    ChipSelect(u8),
    #[error("fault threshold must be between 1 and {max} (got {got})")]
    FaultThreshold { got: usize, max: usize },
    #[error("step tolerance must be a non-negative number (got {0})")]
    StepTolerance(f64),
    #[error(transparent)]
    Pid(#[from] crate::control::PidError),
    #[error(transparent)]
    Profile(#[from] crate::profile::ProfileError),
}

impl TuningConfig {
    pub(crate) fn validate(&self) -> Result<(), InvalidConfig> {
        if !self.timer_period.is_finite() || self.timer_period <= 0.0 {
            return Err(InvalidConfig::TimerPeriod(self.timer_period));
        }
        if self.fault_threshold == 0 || self.fault_threshold > FAULT_HISTORY_LEN {
            return Err(InvalidConfig::FaultThreshold {
                got: self.fault_threshold,
                max: FAULT_HISTORY_LEN,
            });
        }
        if !self.step_tolerance.is_finite() || self.step_tolerance < 0.0 {
            return Err(InvalidConfig::StepTolerance(self.step_tolerance));
        }
        self.pid.validate()?;
        Ok(())
    }
}

impl PinConfig {
    pub(crate) fn validate(&self) -> Result<(), InvalidConfig> {
        if self.spi_cs > 1 {
            return Err(InvalidConfig::ChipSelect(self.spi_cs));
        }
        Ok(())
    }
}
