//! Control loop driver
//!
//! Ticks a [`ProfileStateMachine`] at its configured period, applies the
//! sensor fault policy after every tick and publishes a snapshot for
//! concurrent readers. Works with any sensor/actuator pair; the simulated
//! oven is advanced through the `between_ticks` hook.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use toaster_core::config::ToasterConfig;
use toaster_core::safety::{FaultKind, SafetyStatus, SensorFaultPolicy};
use toaster_core::scheduler::{ActuatorSelfTest, ProfileStateMachine, SelfTestStatus};
use toaster_core::telemetry::SnapshotCell;
use toaster_core::traits::{BinaryActuator, TemperatureSensor};

/// Loop pacing and limits
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Sleep out the remainder of each period
    pub realtime: bool,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// Every step completed
    Complete,
    /// Stopped by the sensor fault policy
    Aborted(FaultKind),
    /// Stopped at the tick limit
    TickLimit,
}

/// Drives one machine until it completes, faults or hits the tick limit
pub struct Runner<S, A> {
    machine: ProfileStateMachine<S, A>,
    policy: SensorFaultPolicy,
    snapshots: SnapshotCell,
    completed: Arc<AtomicBool>,
}

impl<S: TemperatureSensor, A: BinaryActuator> Runner<S, A> {
    /// Build a runner from a validated configuration
    pub fn new(config: &ToasterConfig, sensor: S, actuator: A) -> Result<Self> {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();
        let machine = ProfileStateMachine::from_config(config, sensor, actuator)
            .context("failed to build the profile state machine")?
            .on_complete(move || flag.store(true, Ordering::SeqCst));

        Ok(Self {
            machine,
            policy: config.fault_policy(),
            snapshots: SnapshotCell::new(),
            completed,
        })
    }

    /// Handle for observers on other threads
    pub fn snapshots(&self) -> SnapshotCell {
        self.snapshots.clone()
    }

    pub fn machine(&self) -> &ProfileStateMachine<S, A> {
        &self.machine
    }

    /// Run the profile from step 0
    ///
    /// `between_ticks` is called with the period after every tick.
    pub fn run(
        &mut self,
        options: RunOptions,
        mut between_ticks: impl FnMut(f64),
    ) -> Result<RunOutcome> {
        self.completed.store(false, Ordering::SeqCst);
        self.machine.start()?;

        let period = self.machine.period();
        let mut ticks = 0u64;

        loop {
            let started = Instant::now();
            self.machine.tick(false).context("control tick failed")?;

            if let Some(kind) = self.check_faults()? {
                return Ok(RunOutcome::Aborted(kind));
            }
            self.snapshots.publish(self.machine.snapshot());

            if self.completed.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Complete);
            }

            ticks += 1;
            if options.max_ticks.is_some_and(|max| ticks >= max) {
                log::warn!("Tick limit reached at {:.1} s, stopping", self.machine.timestamp());
                self.machine.stop()?;
                return Ok(RunOutcome::TickLimit);
            }

            between_ticks(period);
            if options.realtime {
                pace(started, period);
            }
        }
    }

    /// Click the actuator for the self-test duration
    pub fn self_test(
        &mut self,
        mut test: ActuatorSelfTest,
        options: RunOptions,
        mut between_ticks: impl FnMut(f64),
    ) -> Result<Option<FaultKind>> {
        if !self.machine.begin_self_test() {
            anyhow::bail!("self-test needs a stopped machine ({})", self.machine.status());
        }

        let period = self.machine.period();
        loop {
            let started = Instant::now();
            self.machine.tick(true).context("self-test tick failed")?;

            if let Some(kind) = self.check_faults()? {
                return Ok(Some(kind));
            }

            let status = test
                .step(period, self.machine.actuator_mut())
                .context("failed to drive the actuator")?;
            self.snapshots.publish(self.machine.snapshot());

            if status == SelfTestStatus::Finished {
                self.machine.stop()?;
                return Ok(None);
            }

            between_ticks(period);
            if options.realtime {
                pace(started, period);
            }
        }
    }

    fn check_faults(&mut self) -> Result<Option<FaultKind>> {
        match self.policy.check(self.machine.recent_error_count()) {
            SafetyStatus::Ok => Ok(None),
            SafetyStatus::Fault(kind) => {
                log::error!("Too many thermocouple errors: {kind}");
                self.machine.stop()?;
                Ok(Some(kind))
            }
        }
    }

    /// Write the sample log and, next to it, the configuration that
    /// produced it
    pub fn write_outputs(&self, config: &ToasterConfig, samples: &Path) -> Result<Option<PathBuf>> {
        let written = self
            .machine
            .dump_samples(samples)
            .with_context(|| format!("failed to write samples to {}", samples.display()))?;
        if !written {
            log::warn!("No data to dump");
        }

        let config_path = samples.with_extension("toml");
        config
            .dump(&config_path)
            .with_context(|| format!("failed to write config to {}", config_path.display()))?;
        log::info!("Config stored @ {}", config_path.display());

        Ok(written.then(|| samples.to_path_buf()))
    }

    /// Release the sensor and force the actuator off
    pub fn cleanup(&mut self) {
        self.machine.cleanup();
    }
}

fn pace(started: Instant, period: f64) {
    let period = Duration::from_secs_f64(period);
    if let Some(left) = period.checked_sub(started.elapsed()) {
        thread::sleep(left);
    }
}
