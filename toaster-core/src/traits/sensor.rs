//! Temperature sensor trait

/// Errors that can occur while reading the temperature sensor
///
/// Every variant is transient from the control loop's point of view: the
/// fault is recorded and the next tick simply reads again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SensorFault {
    /// No thermocouple attached (open circuit)
    #[error("no thermocouple attached")]
    NoThermocouple,
    /// Thermocouple shorted to ground
    #[error("thermocouple shorted to ground")]
    ShortToGround,
    /// Thermocouple shorted to VCC
    #[error("thermocouple shorted to vcc")]
    ShortToVcc,
    /// Reserved bits in the conversion frame were not zero
    #[error("invalid conversion frame")]
    InvalidFrame,
    /// The underlying bus transfer failed
    #[error("sensor bus transfer failed")]
    Bus,
    /// The transfer did not finish within the configured timeout
    #[error("sensor read timed out")]
    Timeout,
}

/// Trait for temperature sensors
///
/// Implementations always report degrees Celsius; unit conversion for
/// display happens in the state machine.
pub trait TemperatureSensor {
    /// Read the current process temperature in degrees Celsius
    ///
    /// Takes `&mut self` because bus transfers require mutable access.
    fn read(&mut self) -> Result<f64, SensorFault>;

    /// Secondary diagnostic temperature (e.g. cold-junction) in Celsius
    ///
    /// Reflects the last successful read.
    fn reference_temperature(&self) -> f64 {
        0.0
    }

    /// Release hardware resources
    fn cleanup(&mut self) {}
}

impl<S: TemperatureSensor + ?Sized> TemperatureSensor for Box<S> {
    fn read(&mut self) -> Result<f64, SensorFault> {
        (**self).read()
    }

    fn reference_temperature(&self) -> f64 {
        (**self).reference_temperature()
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }
}
