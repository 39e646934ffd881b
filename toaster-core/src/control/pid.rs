//! PID feedback controller
//!
//! Turns a temperature error into a bounded control output. The controller
//! is purely numeric: the caller supplies the sample time and the measured
//! value, and decides what to do with the output (the profile executor only
//! looks at its sign).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised by the PID controller
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PidError {
    /// `compute` was called before any target was set
    #[error("no target set, cannot compute PID output")]
    NoTarget,
    /// A tunable or input was NaN or infinite
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    /// Output bounds are not ordered
    #[error("output minimum {min} must be less than maximum {max}")]
    InvalidLimits { min: f64, max: f64 },
    /// Windup guard must be a magnitude
    #[error("windup guard must not be negative (got {0})")]
    NegativeWindupGuard(f64),
}

/// PID tunables as persisted in configuration
///
/// An absent bound means unbounded on that side. A windup guard of `0`
/// disables integral clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Derivative gain
    pub kd: f64,
    /// Lower output bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper output bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Clamp applied to the accumulated integral error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windup_guard: Option<f64>,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.6,
            ki: 0.005,
            kd: 7.0,
            min: None,
            max: None,
            windup_guard: Some(20.0),
        }
    }
}

impl PidConfig {
    /// Check every field without touching a controller
    pub fn validate(&self) -> Result<(), PidError> {
        check_finite(self.kp, "kp")?;
        check_finite(self.ki, "ki")?;
        check_finite(self.kd, "kd")?;
        check_limits(self.min, self.max)?;
        check_windup_guard(self.windup_guard)
    }
}

/// Partial PID update
///
/// `None` keeps the current value. For the optional tunables the inner
/// option sets or clears the value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidConfigUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub min: Option<Option<f64>>,
    pub max: Option<Option<f64>>,
    pub windup_guard: Option<Option<f64>>,
}

/// Proportional-integral-derivative controller
#[derive(Debug, Clone, Default)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,

    target: Option<f64>,
    current: f64,

    output: f64,
    error: f64,
    last_error: f64,
    i_error: f64,
    d_error: f64,

    delta_time: f64,
    last_time: f64,

    min: Option<f64>,
    max: Option<f64>,
    windup_guard: Option<f64>,
}

impl PidController {
    /// Create a controller with zero gains, no limits and no target
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller from a configuration record
    pub fn from_config(config: &PidConfig) -> Result<Self, PidError> {
        let mut pid = Self::new();
        pid.set_config(config)?;
        Ok(pid)
    }

    // Gains

    /// Replace all three gains; takes effect on the next `compute`
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), PidError> {
        check_finite(kp, "kp")?;
        check_finite(ki, "ki")?;
        check_finite(kd, "kd")?;
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        Ok(())
    }

    /// Current gains as `(kp, ki, kd)`
    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    // Target and process state

    /// Store a new setpoint
    ///
    /// Integral and derivative state are left untouched.
    pub fn set_target(&mut self, target: f64) -> Result<(), PidError> {
        check_finite(target, "target")?;
        self.target = Some(target);
        Ok(())
    }

    /// Current setpoint, if one has been set
    pub fn target(&self) -> Option<f64> {
        self.target
    }

    /// Last process value passed to `compute`
    pub fn current_value(&self) -> f64 {
        self.current
    }

    /// Last clamped output
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Last proportional error
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Accumulated integral error
    pub fn integral_error(&self) -> f64 {
        self.i_error
    }

    /// Last derivative error
    pub fn derivative_error(&self) -> f64 {
        self.d_error
    }

    // Limits

    /// Set both output bounds
    ///
    /// Rejected without side effects if both are set and `min >= max`.
    pub fn set_limits(&mut self, min: Option<f64>, max: Option<f64>) -> Result<(), PidError> {
        check_limits(min, max)?;
        self.min = min;
        self.max = max;
        Ok(())
    }

    /// Set the lower output bound, keeping the upper one
    pub fn set_min(&mut self, min: Option<f64>) -> Result<(), PidError> {
        self.set_limits(min, self.max)
    }

    /// Set the upper output bound, keeping the lower one
    pub fn set_max(&mut self, max: Option<f64>) -> Result<(), PidError> {
        self.set_limits(self.min, max)
    }

    /// Output bounds as `(min, max)`
    pub fn limits(&self) -> (Option<f64>, Option<f64>) {
        (self.min, self.max)
    }

    /// Set the integral clamp; `None` (or zero) disables it
    pub fn set_windup_guard(&mut self, guard: Option<f64>) -> Result<(), PidError> {
        check_windup_guard(guard)?;
        self.windup_guard = guard;
        Ok(())
    }

    /// Configured integral clamp
    pub fn windup_guard(&self) -> Option<f64> {
        self.windup_guard
    }

    // Config

    /// Current tunables
    pub fn config(&self) -> PidConfig {
        PidConfig {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            min: self.min,
            max: self.max,
            windup_guard: self.windup_guard,
        }
    }

    /// Replace all tunables
    ///
    /// The whole record is validated before anything is stored. Resets the
    /// integral error.
    pub fn set_config(&mut self, config: &PidConfig) -> Result<(), PidError> {
        config.validate()?;
        self.kp = config.kp;
        self.ki = config.ki;
        self.kd = config.kd;
        self.min = config.min;
        self.max = config.max;
        self.windup_guard = config.windup_guard;
        self.zero_integral_error();
        Ok(())
    }

    /// Apply a partial update; unspecified fields keep their current value
    pub fn update_config(&mut self, update: &PidConfigUpdate) -> Result<(), PidError> {
        let current = self.config();
        let merged = PidConfig {
            kp: update.kp.unwrap_or(current.kp),
            ki: update.ki.unwrap_or(current.ki),
            kd: update.kd.unwrap_or(current.kd),
            min: update.min.unwrap_or(current.min),
            max: update.max.unwrap_or(current.max),
            windup_guard: update.windup_guard.unwrap_or(current.windup_guard),
        };
        self.set_config(&merged)
    }

    // Execution

    /// Reset accumulated integral error
    pub fn zero_integral_error(&mut self) {
        self.i_error = 0.0;
    }

    /// Restart the time base; the next `compute` measures from `t = 0`
    pub fn reset_clock(&mut self) {
        self.last_time = 0.0;
    }

    /// Compute the clamped output for a new sample
    ///
    /// The integral accumulates the raw error before the windup clamp is
    /// applied. The derivative is forced to zero on a new step or when no
    /// time has elapsed since the previous sample.
    pub fn compute(
        &mut self,
        current_time: f64,
        current_value: f64,
        is_new_step: bool,
    ) -> Result<f64, PidError> {
        let target = self.target.ok_or(PidError::NoTarget)?;
        check_finite(current_time, "current_time")?;
        check_finite(current_value, "current_value")?;

        self.delta_time = current_time - self.last_time;
        self.current = current_value;

        self.error = target - self.current;
        self.i_error += self.error * self.delta_time;

        if let Some(guard) = self.active_windup_guard() {
            self.i_error = self.i_error.clamp(-guard, guard);
        }

        self.d_error = if is_new_step || self.delta_time == 0.0 {
            0.0
        } else {
            (self.error - self.last_error) / self.delta_time
        };

        let raw = self.kp * self.error + self.ki * self.i_error + self.kd * self.d_error;
        self.output = self.clamp_output(raw);

        self.last_time = current_time;
        self.last_error = self.error;

        Ok(self.output)
    }

    fn active_windup_guard(&self) -> Option<f64> {
        self.windup_guard.filter(|g| *g > 0.0)
    }

    fn clamp_output(&self, value: f64) -> f64 {
        match (self.min, self.max) {
            (_, Some(max)) if value > max => max,
            (Some(min), _) if value < min => min,
            _ => value,
        }
    }
}

impl fmt::Display for PidController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target.unwrap_or(0.0);
        write!(
            f,
            "target {:7.2}, value {:7.2}, output {:8.3}, P {:8.3}, I {:8.3}, D {:8.3}",
            target,
            self.current,
            self.output,
            self.kp * self.error,
            self.ki * self.i_error,
            self.kd * self.d_error
        )
    }
}

fn check_finite(value: f64, field: &'static str) -> Result<(), PidError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PidError::NonFinite { field })
    }
}

fn check_limits(min: Option<f64>, max: Option<f64>) -> Result<(), PidError> {
    if let Some(min) = min {
        check_finite(min, "min")?;
    }
    if let Some(max) = max {
        check_finite(max, "max")?;
    }
    match (min, max) {
        (Some(min), Some(max)) if min >= max => Err(PidError::InvalidLimits { min, max }),
        _ => Ok(()),
    }
}

fn check_windup_guard(guard: Option<f64>) -> Result<(), PidError> {
    match guard {
        Some(g) if !g.is_finite() => Err(PidError::NonFinite {
            field: "windup_guard",
        }),
        Some(g) if g < 0.0 => Err(PidError::NegativeWindupGuard(g)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_pid() -> PidController {
        PidController::from_config(&PidConfig {
            kp: 1.0,
            ki: 0.01,
            kd: 10.0,
            min: None,
            max: None,
            windup_guard: Some(20.0),
        })
        .unwrap()
    }

    #[test]
    fn test_compute_without_target_fails() {
        let mut pid = test_pid();
        assert_eq!(pid.compute(0.5, 10.0, false), Err(PidError::NoTarget));
    }

    #[test]
    fn test_zero_target_is_valid() {
        let mut pid = test_pid();
        pid.set_target(0.0).unwrap();
        assert!(pid.compute(1.0, 150.0, true).unwrap() < 0.0);
    }

    #[test]
    fn test_output_sign_follows_error() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        for i in 1..=10 {
            let out = pid.compute(i as f64 / 2.0, i as f64, false).unwrap();
            assert!(out >= 0.0);
        }

        pid.set_target(-100.0).unwrap();
        pid.reset_clock();
        pid.zero_integral_error();
        pid.compute(0.0, 0.0, true).unwrap();
        for i in 1..=10 {
            let out = pid.compute(i as f64 / 2.0, -(i as f64), false).unwrap();
            assert!(out <= 0.0);
        }
    }

    #[test]
    fn test_zero_integral_error() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        pid.compute(0.0, 10.0, false).unwrap();
        pid.compute(1.0, 10.0, false).unwrap();
        assert!(pid.integral_error() != 0.0);

        pid.zero_integral_error();
        assert_eq!(pid.integral_error(), 0.0);

        // Accumulates from zero again: 90 error over 1 second, then clamped
        pid.set_windup_guard(None).unwrap();
        pid.compute(2.0, 10.0, false).unwrap();
        assert_eq!(pid.integral_error(), 90.0);
    }

    #[test]
    fn test_windup_guard_clamps_integral() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        pid.compute(0.0, 10.0, false).unwrap();
        pid.compute(1.0, 10.0, false).unwrap();
        assert_eq!(pid.integral_error(), 20.0);

        pid.set_target(-100.0).unwrap();
        pid.compute(2.0, 10.0, false).unwrap();
        assert_eq!(pid.integral_error(), -20.0);
    }

    #[test]
    fn test_zero_windup_guard_disables_clamp() {
        let mut pid = test_pid();
        pid.set_windup_guard(Some(0.0)).unwrap();
        pid.set_target(100.0).unwrap();
        pid.compute(1.0, 10.0, false).unwrap();
        assert_eq!(pid.integral_error(), 90.0);
    }

    #[test]
    fn test_negative_windup_guard_rejected() {
        let mut pid = test_pid();
        assert_eq!(
            pid.set_windup_guard(Some(-45.0)),
            Err(PidError::NegativeWindupGuard(-45.0))
        );
        assert_eq!(pid.windup_guard(), Some(20.0));
    }

    #[test]
    fn test_new_step_suppresses_derivative() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        pid.compute(1.0, 10.0, false).unwrap();
        pid.compute(2.0, 50.0, false).unwrap();
        assert!(pid.derivative_error() != 0.0);

        pid.set_target(200.0).unwrap();
        pid.compute(3.0, 55.0, true).unwrap();
        assert_eq!(pid.derivative_error(), 0.0);
    }

    #[test]
    fn test_zero_delta_time_suppresses_derivative() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        let out = pid.compute(0.0, 10.0, false).unwrap();
        assert_eq!(pid.derivative_error(), 0.0);
        assert!(out.is_finite());
    }

    #[test]
    fn test_limit_ordering() {
        let mut pid = test_pid();
        pid.set_min(Some(0.0)).unwrap();
        assert_eq!(
            pid.set_max(Some(-10.0)),
            Err(PidError::InvalidLimits {
                min: 0.0,
                max: -10.0
            })
        );
        assert_eq!(pid.limits(), (Some(0.0), None));

        pid.set_max(Some(10.0)).unwrap();
        assert!(pid.set_min(Some(11.0)).is_err());
        assert!(pid.set_min(Some(10.0)).is_err());
        assert_eq!(pid.limits(), (Some(0.0), Some(10.0)));

        // Clearing one side is always accepted
        pid.set_min(None).unwrap();
        assert_eq!(pid.limits(), (None, Some(10.0)));
    }

    #[test]
    fn test_single_sided_clamp() {
        let mut pid = test_pid();
        pid.set_limits(None, Some(5.0)).unwrap();
        pid.set_target(100.0).unwrap();
        assert_eq!(pid.compute(1.0, 0.0, true).unwrap(), 5.0);

        pid.set_target(-100.0).unwrap();
        assert!(pid.compute(2.0, 0.0, true).unwrap() < -5.0);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut pid = test_pid();
        assert!(pid.set_target(f64::NAN).is_err());
        assert!(pid.set_gains(f64::INFINITY, 0.0, 0.0).is_err());
        assert_eq!(pid.gains(), (1.0, 0.01, 10.0));

        pid.set_target(100.0).unwrap();
        assert!(pid.compute(1.0, f64::NAN, false).is_err());
    }

    #[test]
    fn test_update_config_keeps_unspecified() {
        let mut pid = test_pid();
        pid.update_config(&PidConfigUpdate {
            kp: Some(50.0),
            max: Some(Some(100.0)),
            ..Default::default()
        })
        .unwrap();

        let config = pid.config();
        assert_eq!(config.kp, 50.0);
        assert_eq!(config.ki, 0.01);
        assert_eq!(config.max, Some(100.0));
        assert_eq!(config.min, None);
        assert_eq!(config.windup_guard, Some(20.0));
    }

    #[test]
    fn test_invalid_config_is_atomic() {
        let mut pid = test_pid();
        let bad = PidConfig {
            kp: 3.0,
            min: Some(10.0),
            max: Some(1.0),
            ..pid.config()
        };
        assert!(pid.set_config(&bad).is_err());
        assert_eq!(pid.gains(), (1.0, 0.01, 10.0));
        assert_eq!(pid.limits(), (None, None));
    }

    #[test]
    fn test_display() {
        let mut pid = test_pid();
        pid.set_target(100.0).unwrap();
        pid.compute(1.0, 50.0, true).unwrap();
        let line = pid.to_string();
        assert!(line.contains("target  100.00"));
        assert!(line.contains("value   50.00"));
    }

    proptest! {
        #[test]
        fn prop_output_within_limits(
            min in -50.0f64..0.0,
            span in 0.1f64..100.0,
            samples in prop::collection::vec(-300.0f64..300.0, 1..200),
        ) {
            let mut pid = test_pid();
            pid.set_limits(Some(min), Some(min + span)).unwrap();
            pid.set_target(100.0).unwrap();
            for (i, value) in samples.iter().enumerate() {
                let out = pid.compute(i as f64 * 0.5, *value, false).unwrap();
                prop_assert!(out >= min && out <= min + span);
            }
        }

        #[test]
        fn prop_integral_within_guard(
            guard in 0.1f64..100.0,
            samples in prop::collection::vec(-300.0f64..300.0, 1..200),
        ) {
            let mut pid = test_pid();
            pid.set_windup_guard(Some(guard)).unwrap();
            pid.set_target(100.0).unwrap();
            for (i, value) in samples.iter().enumerate() {
                pid.compute(i as f64, *value, i % 7 == 0).unwrap();
                prop_assert!(pid.integral_error().abs() <= guard);
            }
        }

        #[test]
        fn prop_new_step_derivative_is_zero(
            history in prop::collection::vec(-300.0f64..300.0, 0..50),
            value in -300.0f64..300.0,
        ) {
            let mut pid = test_pid();
            pid.set_target(150.0).unwrap();
            for (i, v) in history.iter().enumerate() {
                pid.compute(i as f64, *v, false).unwrap();
            }
            pid.compute(history.len() as f64 + 1.0, value, true).unwrap();
            prop_assert_eq!(pid.derivative_error(), 0.0);
        }

        #[test]
        fn prop_rejected_limits_leave_state(
            min in -100.0f64..100.0,
            below in 0.0f64..100.0,
        ) {
            let mut pid = test_pid();
            pid.set_min(Some(min)).unwrap();
            prop_assert!(pid.set_max(Some(min - below)).is_err());
            prop_assert_eq!(pid.limits(), (Some(min), None));
        }

        #[test]
        fn prop_config_round_trip(
            kp in -10.0f64..10.0,
            ki in -1.0f64..1.0,
            kd in -10.0f64..10.0,
            min in prop::option::of(-100.0f64..0.0),
            max in prop::option::of(1.0f64..100.0),
            guard in prop::option::of(0.0f64..50.0),
        ) {
            let mut pid = PidController::from_config(&PidConfig {
                kp, ki, kd, min, max, windup_guard: guard,
            }).unwrap();
            let before = pid.config();
            pid.set_config(&before).unwrap();
            prop_assert_eq!(pid.config(), before);
        }
    }
}
