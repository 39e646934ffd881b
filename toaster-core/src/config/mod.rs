//! Configuration types
//!
//! The controller configuration is a TOML document parsed with `serde`.
//! Loading validates everything up front, so a configuration that loads
//! can always build a profile and a PID controller.

pub mod types;
pub mod units;

use std::fs;
use std::path::Path;

pub use types::*;
pub use units::TemperatureUnit;

use crate::control::PidController;
use crate::profile::Profile;
use crate::safety::SensorFaultPolicy;

/// Configuration loading and persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write configuration: {0}")]
    Write(#[source] std::io::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] InvalidConfig),
}

impl ToasterConfig {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a configuration document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to `path`, replacing any existing file
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        fs::write(path, text).map_err(ConfigError::Write)
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        self.pins.validate()?;
        self.tuning.validate()?;
        Profile::new(self.steps.clone())?;
        Ok(())
    }

    /// Build the step list
    pub fn profile(&self) -> Result<Profile, InvalidConfig> {
        Ok(Profile::new(self.steps.clone())?)
    }

    /// Build a PID controller from the tuning section
    pub fn pid(&self) -> Result<PidController, InvalidConfig> {
        Ok(PidController::from_config(&self.tuning.pid)?)
    }

    /// Sensor fault abort policy
    pub fn fault_policy(&self) -> SensorFaultPolicy {
        SensorFaultPolicy::new(self.tuning.fault_threshold)
    }

    /// Ramp completion buffer in Celsius
    pub fn step_tolerance(&self) -> f64 {
        self.tuning.step_tolerance
    }
}
