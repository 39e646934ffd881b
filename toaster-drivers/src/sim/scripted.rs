//! Deterministic fakes

use std::collections::VecDeque;

use toaster_core::traits::{ActuatorFault, BinaryActuator, SensorFault, TemperatureSensor};

/// Sensor replaying a fixed script of readings and faults
///
/// Once the script is down to its final entry, that entry repeats forever.
/// An empty script reports [`SensorFault::Bus`].
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: VecDeque<Result<f64, SensorFault>>,
    reference: f64,
    cleaned_up: bool,
}

impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Result<f64, SensorFault>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            reference: 25.0,
            cleaned_up: false,
        }
    }

    /// A sensor that always reads `celsius`
    pub fn constant(celsius: f64) -> Self {
        Self::new([Ok(celsius)])
    }

    pub fn with_reference(mut self, celsius: f64) -> Self {
        self.reference = celsius;
        self
    }

    /// Append entries to the script
    pub fn extend(&mut self, entries: impl IntoIterator<Item = Result<f64, SensorFault>>) {
        self.script.extend(entries);
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read(&mut self) -> Result<f64, SensorFault> {
        let next = if self.script.len() > 1 {
            self.script.pop_front()
        } else {
            self.script.front().copied()
        };
        next.unwrap_or(Err(SensorFault::Bus))
    }

    fn reference_temperature(&self) -> f64 {
        self.reference
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
    }
}

/// Actuator recording every state change
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    on: bool,
    transitions: Vec<bool>,
    fail: bool,
    cleaned_up: bool,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// States entered, in order (repeated commands are not recorded)
    pub fn transitions(&self) -> &[bool] {
        &self.transitions
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorFault> {
        if self.fail {
            return Err(ActuatorFault::Gpio);
        }
        if self.on != on {
            self.transitions.push(on);
        }
        self.on = on;
        Ok(())
    }
}

impl BinaryActuator for MemoryRelay {
    fn enable(&mut self) -> Result<(), ActuatorFault> {
        self.drive(true)
    }

    fn disable(&mut self) -> Result<(), ActuatorFault> {
        self.drive(false)
    }

    fn state(&self) -> bool {
        self.on
    }

    fn cleanup(&mut self) {
        self.on = false;
        self.cleaned_up = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_replays_then_repeats() {
        let mut sensor = ScriptedSensor::new([Ok(20.0), Err(SensorFault::ShortToVcc), Ok(30.0)]);
        assert_eq!(sensor.read(), Ok(20.0));
        assert_eq!(sensor.read(), Err(SensorFault::ShortToVcc));
        assert_eq!(sensor.read(), Ok(30.0));
        assert_eq!(sensor.read(), Ok(30.0));

        sensor.extend([Ok(40.0)]);
        assert_eq!(sensor.read(), Ok(30.0));
        assert_eq!(sensor.read(), Ok(40.0));
    }

    #[test]
    fn test_empty_script_is_bus_fault() {
        let mut sensor = ScriptedSensor::new([]);
        assert_eq!(sensor.read(), Err(SensorFault::Bus));
    }

    #[test]
    fn test_memory_relay_records_transitions() {
        let mut relay = MemoryRelay::new();
        relay.enable().unwrap();
        relay.enable().unwrap();
        relay.disable().unwrap();
        assert_eq!(relay.transitions(), &[true, false]);

        relay.set_failing(true);
        assert_eq!(relay.enable(), Err(ActuatorFault::Gpio));
        assert!(!relay.state());
    }

    #[test]
    fn test_cleanup_flags() {
        let mut sensor = ScriptedSensor::constant(25.0);
        let mut relay = MemoryRelay::new();
        relay.enable().unwrap();
        sensor.cleanup();
        relay.cleanup();
        assert!(sensor.is_cleaned_up());
        assert!(relay.is_cleaned_up());
        assert!(!relay.state());
    }
}
