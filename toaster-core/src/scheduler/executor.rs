//! Profile execution
//!
//! The [`ProfileStateMachine`] is ticked at a fixed period by an external
//! clock. Every tick reads the sensor; while a run is in flight it also
//! advances the run clock, moves through the profile steps and, at a 1 Hz
//! control cadence, runs the PID controller and switches the actuator on
//! the sign of its output.

use std::io;
use std::path::Path;

use super::samples::{Sample, SampleLog};
use crate::config::{TemperatureUnit, ToasterConfig, DEFAULT_STEP_TOLERANCE};
use crate::control::PidController;
use crate::error::{MachineError, Result};
use crate::profile::{Profile, ProfileStep, StepKind};
use crate::safety::FaultHistory;
use crate::state::{RunEvent, RunStatus};
use crate::telemetry::RunSnapshot;
use crate::traits::{BinaryActuator, SensorFault, TemperatureSensor};

/// Run time between PID evaluations in seconds
pub const CONTROL_INTERVAL: f64 = 1.0;

/// Default log target for state machine messages
pub const DEFAULT_LOG_TARGET: &str = "toaster::machine";

// Slack for comparisons against the run clock
const TIME_EPSILON: f64 = 1e-9;

type CompletionCallback = Box<dyn FnMut() + Send>;

/// Drives one reflow profile with a PID controller and a binary actuator
pub struct ProfileStateMachine<S, A> {
    profile: Profile,
    pid: PidController,
    sensor: S,
    actuator: A,

    /// Seconds added to the run clock per tick
    period: f64,
    units: TemperatureUnit,
    /// Ramp completion buffer in Celsius
    step_tolerance: f64,

    status: RunStatus,
    step_index: usize,
    /// Ticks counted by the run clock; `timestamp` derives from it
    ticks: u64,
    timestamp: f64,
    last_control_timestamp: f64,
    step_end: f64,
    target: f64,
    last_target: f64,
    step_kind: StepKind,
    step_changed: bool,

    /// Last good reading in display units
    temperature: f64,
    faults: FaultHistory,
    samples: SampleLog,

    on_complete: Option<CompletionCallback>,
    log_target: String,
}

impl<S: TemperatureSensor, A: BinaryActuator> ProfileStateMachine<S, A> {
    /// Create a stopped machine positioned on the first step
    pub fn new(
        profile: Profile,
        pid: PidController,
        sensor: S,
        actuator: A,
        period: f64,
    ) -> Result<Self> {
        if !period.is_finite() || period <= 0.0 {
            return Err(MachineError::InvalidSetting {
                name: "timer period",
                value: period,
            });
        }

        let mut machine = Self {
            profile,
            pid,
            sensor,
            actuator,
            period,
            units: TemperatureUnit::Celsius,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            status: RunStatus::Stopped,
            step_index: 0,
            ticks: 0,
            timestamp: 0.0,
            last_control_timestamp: 0.0,
            step_end: 0.0,
            target: 0.0,
            last_target: 0.0,
            step_kind: StepKind::Ramp,
            step_changed: false,
            temperature: 0.0,
            faults: FaultHistory::new(),
            samples: SampleLog::new(),
            on_complete: None,
            log_target: DEFAULT_LOG_TARGET.into(),
        };
        machine.enter_step()?;
        Ok(machine)
    }

    /// Create a machine from a loaded configuration
    pub fn from_config(config: &ToasterConfig, sensor: S, actuator: A) -> Result<Self> {
        let profile = Profile::new(config.steps.clone())?;
        let pid = PidController::from_config(&config.tuning.pid)?;
        Self::new(profile, pid, sensor, actuator, config.tuning.timer_period)?
            .with_units(config.units)
            .with_step_tolerance(config.tuning.step_tolerance)
    }

    /// Set the display unit used for targets and samples
    pub fn with_units(mut self, units: TemperatureUnit) -> Self {
        self.units = units;
        self
    }

    /// Set the ramp completion buffer in degrees Celsius
    pub fn with_step_tolerance(mut self, celsius: f64) -> Result<Self> {
        if !celsius.is_finite() || celsius < 0.0 {
            return Err(MachineError::InvalidSetting {
                name: "step tolerance",
                value: celsius,
            });
        }
        self.step_tolerance = celsius;
        Ok(self)
    }

    /// Use a custom log target
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Register the notification fired when the final step completes
    pub fn on_complete(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    // Commands

    /// Begin a run from step 0
    ///
    /// Clears the samples of the previous run. Ignored while a self-test is
    /// in progress.
    pub fn start(&mut self) -> Result<()> {
        let next = self.status.transition(RunEvent::Start);
        if next != RunStatus::Running {
            log::warn!(
                target: self.log_target.as_str(),
                "Cannot start while {}",
                self.status
            );
            return Ok(());
        }

        self.status = next;
        self.pid.zero_integral_error();
        self.pid.reset_clock();
        self.reset_run_clock();
        self.step_index = 0;
        self.target = 0.0;
        self.samples.clear();

        log::info!(
            target: self.log_target.as_str(),
            "Starting profile with {} steps",
            self.profile.len()
        );
        self.enter_step()
    }

    /// Abort the run or self-test and return to step 0
    ///
    /// Samples from the aborted run are kept for export.
    pub fn stop(&mut self) -> Result<()> {
        if self.status == RunStatus::Stopped {
            return Ok(());
        }

        log::info!(
            target: self.log_target.as_str(),
            "Stopping at {:.1} s ({})",
            self.timestamp,
            self.status
        );

        self.status = self.status.transition(RunEvent::Stop);
        self.step_index = 0;
        self.reset_run_clock();
        self.target = 0.0;
        self.enter_step()?;
        self.actuator.disable()?;
        Ok(())
    }

    /// Freeze the run clock; returns whether the run was paused
    pub fn pause(&mut self) -> bool {
        self.apply(RunEvent::Pause, RunStatus::Paused)
    }

    /// Continue a paused run; returns whether the run resumed
    pub fn resume(&mut self) -> bool {
        self.apply(RunEvent::Resume, RunStatus::Running)
    }

    /// Enter actuator self-test mode; returns whether the mode was entered
    ///
    /// Only accepted while stopped. Leave with [`stop`](Self::stop).
    pub fn begin_self_test(&mut self) -> bool {
        if !self.apply(RunEvent::BeginSelfTest, RunStatus::Testing) {
            return false;
        }
        self.reset_run_clock();
        true
    }

    fn apply(&mut self, event: RunEvent, expected: RunStatus) -> bool {
        let next = self.status.transition(event);
        if next != expected || next == self.status {
            log::debug!(
                target: self.log_target.as_str(),
                "{:?} ignored while {}",
                event,
                self.status
            );
            return false;
        }
        log::info!(
            target: self.log_target.as_str(),
            "{} -> {} at {:.1} s",
            self.status,
            next,
            self.timestamp
        );
        self.status = next;
        true
    }

    /// Replace the step list while no run is in flight
    ///
    /// Returns whether the profile was accepted. A completed run is reset
    /// to stopped.
    pub fn set_profile(&mut self, profile: Profile) -> Result<bool> {
        if !matches!(self.status, RunStatus::Stopped | RunStatus::Complete) {
            return Ok(false);
        }
        self.profile = profile;
        self.status = RunStatus::Stopped;
        self.step_index = 0;
        self.reset_run_clock();
        self.target = 0.0;
        self.enter_step()?;
        Ok(true)
    }

    // Tick

    /// Per-period heartbeat
    ///
    /// With `is_test_mode` set, an idle machine leaves the actuator to the
    /// self-test routine instead of forcing it off.
    pub fn tick(&mut self, is_test_mode: bool) -> Result<()> {
        self.read_sensor();

        if !self.status.advances_time() {
            if !is_test_mode {
                self.actuator.disable()?;
            }
            return Ok(());
        }

        self.ticks += 1;
        self.timestamp = self.ticks as f64 * self.period;

        if self.status == RunStatus::Testing {
            return Ok(());
        }

        if self.is_step_complete() {
            self.advance_step()?;
            if self.status == RunStatus::Complete {
                self.actuator.disable()?;
                return Ok(());
            }
        }

        // The final step is a cooldown and never heats, control tick or not
        if self.profile.is_last(self.step_index) {
            self.actuator.disable()?;
        }

        if self.timestamp - self.last_control_timestamp >= CONTROL_INTERVAL - TIME_EPSILON {
            self.last_control_timestamp = self.timestamp;
            self.control()?;
        }

        Ok(())
    }

    fn reset_run_clock(&mut self) {
        self.ticks = 0;
        self.timestamp = 0.0;
        self.last_control_timestamp = 0.0;
    }

    fn read_sensor(&mut self) {
        let outcome = self.sensor.read().and_then(|celsius| {
            if celsius.is_finite() {
                Ok(celsius)
            } else {
                Err(SensorFault::InvalidFrame)
            }
        });

        match outcome {
            Ok(celsius) => {
                self.temperature = self.units.from_celsius(celsius);
                self.faults.record(None);
            }
            Err(fault) => {
                log::warn!(target: self.log_target.as_str(), "Thermocouple read error: {fault}");
                self.faults.record(Some(fault));
            }
        }
    }

    fn control(&mut self) -> Result<()> {
        let output = self
            .pid
            .compute(self.timestamp, self.temperature, self.step_changed)?;
        self.step_changed = false;

        let heat =
            self.status.heater_allowed() && !self.profile.is_last(self.step_index) && output > 0.0;
        self.actuator.set(heat)?;

        log::debug!(
            target: self.log_target.as_str(),
            "{:7.2}, {}, {}",
            self.timestamp,
            self.step_end_display(),
            self.pid
        );

        self.samples.push(Sample {
            timestamp: self.timestamp,
            temperature: self.temperature,
            target: self.target,
            step: self.step_name().to_string(),
            actuator_on: self.actuator.state(),
            pid_output: self.pid.output(),
            pid_error: self.pid.error(),
            pid_i_error: self.pid.integral_error(),
            pid_d_error: self.pid.derivative_error(),
        });
        Ok(())
    }

    fn step_end_display(&self) -> String {
        match self.step_kind {
            StepKind::Soak => format!("{:7.2}", self.step_end),
            StepKind::Ramp => "    n/a".to_string(),
        }
    }

    // Step logic

    /// Check if the active step has reached its end condition
    ///
    /// Soak steps end on time. Ramp steps end once the measured temperature
    /// is within the tolerance of the target, approached from the side of
    /// the previous target.
    pub fn is_step_complete(&self) -> bool {
        match self.step_kind {
            StepKind::Soak => self.timestamp >= self.step_end - TIME_EPSILON,
            StepKind::Ramp => {
                let buffer = self.units.scale_delta(self.step_tolerance);
                if self.target > self.last_target {
                    self.temperature >= self.target - buffer
                } else if self.target < self.last_target {
                    self.temperature <= self.target + buffer
                } else {
                    false
                }
            }
        }
    }

    /// Move to the next step, completing the run after the last one
    ///
    /// Does nothing unless a run is in flight.
    pub fn advance_step(&mut self) -> Result<()> {
        if !self.status.is_active() {
            return Ok(());
        }

        log::debug!(
            target: self.log_target.as_str(),
            "{:.2} - leaving step {}",
            self.timestamp,
            self.step_name()
        );
        self.step_index += 1;

        if self.step_index == self.profile.len() {
            self.status = self.status.transition(RunEvent::ProfileFinished);
            log::info!(
                target: self.log_target.as_str(),
                "Profile complete after {:.1} s",
                self.timestamp
            );
            if let Some(callback) = self.on_complete.as_mut() {
                callback();
            }
            return Ok(());
        }

        self.enter_step()
    }

    /// Load the variables of the step at the current index
    ///
    /// Classifies the step against the previous target, sets its end time,
    /// zeroes the integral error and flags the step change so the next
    /// PID evaluation skips its derivative term.
    pub fn enter_step(&mut self) -> Result<()> {
        let Some(step) = self.profile.get(self.step_index) else {
            return Ok(());
        };
        let (target, duration) = (step.target, step.duration);

        self.last_target = self.target;
        self.target = target;
        self.step_kind = StepKind::classify(self.last_target, self.target);
        self.step_end = self.timestamp + duration;

        self.pid.set_target(target)?;
        self.pid.zero_integral_error();
        self.step_changed = true;

        if !matches!(self.status, RunStatus::Stopped | RunStatus::Paused) {
            log::info!(
                target: self.log_target.as_str(),
                "New step {} ({}), target {:7.2} {}, end {}",
                self.step_name(),
                self.step_kind.as_str(),
                self.target,
                self.units.short(),
                self.step_end_display()
            );
        }
        Ok(())
    }

    // Faults and data

    /// Failed reads among the last ten
    pub fn recent_error_count(&self) -> usize {
        self.faults.recent_error_count()
    }

    /// Outcomes of the last ten sensor reads
    pub fn faults(&self) -> &FaultHistory {
        &self.faults
    }

    /// Samples of the current (or last) run
    pub fn samples(&self) -> &SampleLog {
        &self.samples
    }

    /// Export the sample log as CSV
    ///
    /// Returns `Ok(false)` if nothing has been recorded.
    pub fn dump_samples(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        let written = self.samples.dump(&path)?;
        if written {
            log::info!(
                target: self.log_target.as_str(),
                "Wrote {} samples to {}",
                self.samples.len(),
                path.as_ref().display()
            );
        }
        Ok(written)
    }

    /// Copy of the observable state
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            status: self.status,
            step: self.step_name().to_string(),
            step_index: self.step_index,
            timestamp: self.timestamp,
            temperature: self.temperature,
            reference_temperature: self.sensor.reference_temperature(),
            target: self.target,
            actuator_on: self.actuator.state(),
            pid_output: self.pid.output(),
            recent_error_count: self.recent_error_count(),
        }
    }

    /// Release the sensor and force the actuator off
    pub fn cleanup(&mut self) {
        self.actuator.cleanup();
        self.sensor.cleanup();
    }

    // Accessors

    /// Current run status
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Index of the active step (equals the step count once complete)
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Active step, `None` once the run is complete
    pub fn current_step(&self) -> Option<&ProfileStep> {
        self.profile.get(self.step_index)
    }

    /// Name of the active step (empty once complete)
    pub fn step_name(&self) -> &str {
        self.current_step().map_or("", |s| s.name.as_str())
    }

    /// Classification of the active step
    pub fn step_kind(&self) -> StepKind {
        self.step_kind
    }

    /// Elapsed run time in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// End time of the active soak step
    pub fn step_end(&self) -> f64 {
        self.step_end
    }

    /// Active target in display units
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Target of the previous step in display units
    pub fn last_target(&self) -> f64 {
        self.last_target
    }

    /// Last good reading in display units
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Cold-junction temperature in Celsius
    pub fn reference_temperature(&self) -> f64 {
        self.sensor.reference_temperature()
    }

    /// Check if the actuator is currently on
    pub fn actuator_state(&self) -> bool {
        self.actuator.state()
    }

    /// Seconds added to the run clock per tick
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Display unit for targets and samples
    pub fn units(&self) -> TemperatureUnit {
        self.units
    }

    /// Loaded step list
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Feedback controller
    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Controller access for hot tuning between ticks
    pub fn pid_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    /// Temperature sensor
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Mutable sensor access
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Heating actuator
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Actuator access for the self-test routine
    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}
