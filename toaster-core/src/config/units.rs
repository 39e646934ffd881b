//! Temperature display units

use serde::{Deserialize, Serialize};

/// Unit used for targets, samples and display
///
/// Sensors always report Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert an absolute Celsius reading to this unit
    pub fn from_celsius(&self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Convert an absolute value in this unit to Celsius
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }

    /// Scale a Celsius temperature difference to this unit (no offset)
    pub fn scale_delta(&self, delta_celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => delta_celsius,
            TemperatureUnit::Fahrenheit => delta_celsius * 9.0 / 5.0,
        }
    }

    /// Single-letter suffix
    pub fn short(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_conversion() {
        let f = TemperatureUnit::Fahrenheit;
        assert_eq!(f.from_celsius(100.0), 212.0);
        assert_eq!(f.from_celsius(-40.0), -40.0);
        assert_eq!(f.to_celsius(212.0), 100.0);
        assert_eq!(TemperatureUnit::Celsius.from_celsius(42.5), 42.5);
    }

    #[test]
    fn test_delta_has_no_offset() {
        assert_eq!(TemperatureUnit::Fahrenheit.scale_delta(3.0), 5.4);
        assert_eq!(TemperatureUnit::Celsius.scale_delta(3.0), 3.0);
    }
}
