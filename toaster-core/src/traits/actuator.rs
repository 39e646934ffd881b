//! Binary actuator trait (heating relay)

/// Errors that can occur while driving the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorFault {
    /// The output pin could not be driven
    #[error("failed to drive actuator output")]
    Gpio,
}

/// Trait for on/off actuators
///
/// Implementations control the heating element via GPIO relay or SSR.
pub trait BinaryActuator {
    /// Turn the actuator on
    fn enable(&mut self) -> Result<(), ActuatorFault>;

    /// Turn the actuator off
    fn disable(&mut self) -> Result<(), ActuatorFault>;

    /// Check if the actuator is currently on
    fn state(&self) -> bool;

    /// Drive the actuator to the requested state
    fn set(&mut self, on: bool) -> Result<(), ActuatorFault> {
        if on {
            self.enable()
        } else {
            self.disable()
        }
    }

    /// Release hardware resources
    ///
    /// The default implementation forces the actuator off.
    fn cleanup(&mut self) {
        let _ = self.disable();
    }
}

impl<A: BinaryActuator + ?Sized> BinaryActuator for Box<A> {
    fn enable(&mut self) -> Result<(), ActuatorFault> {
        (**self).enable()
    }

    fn disable(&mut self) -> Result<(), ActuatorFault> {
        (**self).disable()
    }

    fn state(&self) -> bool {
        (**self).state()
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }
}
