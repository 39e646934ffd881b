//! First-order oven simulation
//!
//! The element adds heat at a fixed rate while the relay is closed and the
//! chamber loses heat in proportion to its excess over ambient:
//!
//! `dT/dt = heating_rate * on - loss * (T - ambient)`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use toaster_core::traits::{ActuatorFault, BinaryActuator, SensorFault, TemperatureSensor};

/// Thermal state and constants of the simulated chamber
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OvenModel {
    /// Chamber temperature in °C
    pub temperature: f64,
    /// Surrounding temperature in °C
    pub ambient: f64,
    /// Heating rate with the element on, °C/s
    pub heating_rate: f64,
    /// Loss coefficient, 1/s
    pub loss: f64,
    /// Element state
    pub heater_on: bool,
}

impl Default for OvenModel {
    fn default() -> Self {
        // Enough headroom to follow a lead-free profile at the reference
        // tuning
        Self {
            temperature: 25.0,
            ambient: 25.0,
            heating_rate: 5.0,
            loss: 0.01,
            heater_on: false,
        }
    }
}

impl OvenModel {
    /// Integrate `dt` seconds with explicit Euler steps of at most 0.1 s
    pub fn advance(&mut self, dt: f64) {
        let mut left = dt.max(0.0);
        while left > 0.0 {
            let h = left.min(0.1);
            let heat = if self.heater_on { self.heating_rate } else { 0.0 };
            self.temperature += (heat - self.loss * (self.temperature - self.ambient)) * h;
            left -= h;
        }
    }
}

/// Shared simulated oven
///
/// Clones share the same chamber.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOven {
    model: Arc<Mutex<OvenModel>>,
}

impl SimulatedOven {
    pub fn new(model: OvenModel) -> Self {
        Self {
            model: Arc::new(Mutex::new(model)),
        }
    }

    /// Thermocouple mounted in this oven
    pub fn thermocouple(&self) -> SimulatedThermocouple {
        SimulatedThermocouple { oven: self.clone() }
    }

    /// Relay switching this oven's element
    pub fn relay(&self) -> SimulatedRelay {
        SimulatedRelay { oven: self.clone() }
    }

    /// Let `dt` seconds of simulated time pass
    pub fn advance(&self, dt: f64) {
        self.lock().advance(dt);
    }

    pub fn temperature(&self) -> f64 {
        self.lock().temperature
    }

    pub fn heater_on(&self) -> bool {
        self.lock().heater_on
    }

    /// Copy of the current model state
    pub fn model(&self) -> OvenModel {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, OvenModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thermocouple reading the simulated chamber
pub struct SimulatedThermocouple {
    oven: SimulatedOven,
}

impl TemperatureSensor for SimulatedThermocouple {
    fn read(&mut self) -> Result<f64, SensorFault> {
        Ok(self.oven.temperature())
    }

    fn reference_temperature(&self) -> f64 {
        self.oven.lock().ambient
    }
}

/// Relay switching the simulated element
pub struct SimulatedRelay {
    oven: SimulatedOven,
}

impl BinaryActuator for SimulatedRelay {
    fn enable(&mut self) -> Result<(), ActuatorFault> {
        self.oven.lock().heater_on = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ActuatorFault> {
        self.oven.lock().heater_on = false;
        Ok(())
    }

    fn state(&self) -> bool {
        self.oven.heater_on()
    }
}
