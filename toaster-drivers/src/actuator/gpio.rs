//! GPIO relay output
//!
//! Heating element switched through a relay or SSR on a GPIO line.

use embedded_hal::digital::OutputPin;
use toaster_core::traits::{ActuatorFault, BinaryActuator};

/// Relay on a GPIO pin
///
/// The pin can be configured as active-high (default) or active-low.
pub struct GpioRelay<P> {
    pin: P,
    /// If true, relay ON = pin LOW
    inverted: bool,
    /// Current logical state (true = relay energized)
    on: bool,
}

impl<P: OutputPin> GpioRelay<P> {
    /// Create a relay output, driving it off immediately
    ///
    /// # Arguments
    /// - `pin`: The GPIO pin to control
    /// - `active_high`: If false, the relay is ON when the pin is LOW
    pub fn new(pin: P, active_high: bool) -> Result<Self, ActuatorFault> {
        let mut relay = Self {
            pin,
            inverted: !active_high,
            on: false,
        };
        relay.drive(false)?;
        Ok(relay)
    }

    /// Create an active-high relay output
    pub fn new_active_high(pin: P) -> Result<Self, ActuatorFault> {
        Self::new(pin, true)
    }

    /// Create an active-low relay output
    pub fn new_active_low(pin: P) -> Result<Self, ActuatorFault> {
        Self::new(pin, false)
    }

    /// Release the pin
    pub fn release(self) -> P {
        self.pin
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorFault> {
        // Normal: on=true, inverted=false → high
        // Inverted: on=true, inverted=true → low
        let result = if on != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|e| {
            log::error!(target: "toaster::relay", "Relay pin error: {e:?}");
            ActuatorFault::Gpio
        })?;

        if self.on != on {
            log::debug!(target: "toaster::relay", "Relay {}", if on { "on" } else { "off" });
        }
        self.on = on;
        Ok(())
    }
}

impl<P: OutputPin> BinaryActuator for GpioRelay<P> {
    fn enable(&mut self) -> Result<(), ActuatorFault> {
        self.drive(true)
    }

    fn disable(&mut self) -> Result<(), ActuatorFault> {
        self.drive(false)
    }

    fn state(&self) -> bool {
        self.on
    }
}
