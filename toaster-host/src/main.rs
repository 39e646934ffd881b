//! Toaster host runner
//!
//! Loads a TOML configuration and drives the profile state machine against
//! the simulated oven, or with `--hardware` against the MAX31855 and GPIO
//! relay named in the `[pins]` section.

mod hardware;
mod runner;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use toaster_core::config::ToasterConfig;
use toaster_core::scheduler::ActuatorSelfTest;
use toaster_core::telemetry::SnapshotCell;
use toaster_core::traits::{BinaryActuator, TemperatureSensor};
use toaster_drivers::sim::SimulatedOven;

use runner::{RunOptions, RunOutcome, Runner};

#[derive(Parser)]
#[command(name = "toaster", version, about = "Solder reflow profile controller")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reflow profile
    Run {
        /// Configuration file
        #[arg(long)]
        config: PathBuf,
        /// Sample log written on completion (config is dumped next to it)
        #[arg(long, default_value = "toast_data.csv")]
        samples: PathBuf,
        /// Pace ticks in real time instead of as fast as possible
        #[arg(long)]
        realtime: bool,
        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Drive the thermocouple and relay from `[pins]` (always real time)
        #[arg(long)]
        hardware: bool,
    },
    /// Click the relay once per second to check the wiring
    SelfTest {
        /// Configuration file
        #[arg(long)]
        config: PathBuf,
        /// Test duration in seconds
        #[arg(long, default_value_t = toaster_core::scheduler::SELF_TEST_DURATION)]
        duration: f64,
        /// Click the relay from `[pins]` instead of the simulated one
        #[arg(long)]
        hardware: bool,
    },
    /// Validate a configuration and print the profile
    Check {
        /// Configuration file
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            samples,
            realtime,
            max_ticks,
            hardware,
        } => {
            let options = RunOptions {
                realtime,
                max_ticks,
            };
            run_profile(&config, &samples, options, hardware)
        }
        Commands::SelfTest {
            config,
            duration,
            hardware,
        } => self_test(&config, duration, hardware),
        Commands::Check { config } => check(&config),
    }
}

fn load(path: &Path) -> Result<ToasterConfig> {
    ToasterConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn run_profile(
    config_path: &Path,
    samples: &Path,
    options: RunOptions,
    use_hardware: bool,
) -> Result<()> {
    let config = load(config_path)?;

    if use_hardware {
        let (sensor, relay) = hardware::open(&config)?;
        let runner = Runner::new(&config, sensor, relay)?;
        let options = RunOptions {
            realtime: true,
            ..options
        };
        return drive(runner, &config, samples, options, |_| {});
    }

    let oven = SimulatedOven::default();
    let runner = Runner::new(&config, oven.thermocouple(), oven.relay())?;
    drive(runner, &config, samples, options, |dt| oven.advance(dt))
}

fn drive<S: TemperatureSensor, A: BinaryActuator>(
    mut runner: Runner<S, A>,
    config: &ToasterConfig,
    samples: &Path,
    options: RunOptions,
    between_ticks: impl FnMut(f64),
) -> Result<()> {
    let done = Arc::new(AtomicBool::new(false));
    let reporter = if options.realtime {
        let snapshots = runner.snapshots();
        let done = done.clone();
        Some(thread::spawn(move || report_progress(&snapshots, &done)))
    } else {
        None
    };

    let outcome = runner.run(options, between_ticks);
    runner.cleanup();

    done.store(true, Ordering::SeqCst);
    if let Some(reporter) = reporter {
        let _ = reporter.join();
    }

    match outcome? {
        RunOutcome::Complete => {
            log::info!("Reflow complete after {:.1} s", runner.machine().timestamp());
            if let Some(path) = runner.write_outputs(config, samples)? {
                log::info!("CSV stored @ {}", path.display());
            }
            Ok(())
        }
        RunOutcome::Aborted(kind) => anyhow::bail!("run aborted: {kind}"),
        RunOutcome::TickLimit => {
            log::warn!("Run stopped at the tick limit, no data written");
            Ok(())
        }
    }
}

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

// Periodic status line from the published snapshot
fn report_progress(snapshots: &SnapshotCell, done: &AtomicBool) {
    let mut last = Instant::now();
    while !done.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        if last.elapsed() < REPORT_INTERVAL {
            continue;
        }
        last = Instant::now();

        let s = snapshots.latest();
        log::info!(
            "{} {:>8.1} s  {:<10} {:7.2} -> {:7.2}  relay {}  faults {}",
            s.status,
            s.timestamp,
            s.step,
            s.temperature,
            s.target,
            if s.actuator_on { "on" } else { "off" },
            s.recent_error_count
        );
    }
}

fn self_test(config_path: &Path, duration: f64, use_hardware: bool) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        anyhow::bail!("self-test duration must be positive (got {duration})");
    }

    let config = load(config_path)?;
    let test = ActuatorSelfTest::new(duration);

    if use_hardware {
        let (sensor, relay) = hardware::open(&config)?;
        return click(Runner::new(&config, sensor, relay)?, test, |_| {});
    }

    let oven = SimulatedOven::default();
    let runner = Runner::new(&config, oven.thermocouple(), oven.relay())?;
    click(runner, test, |dt| oven.advance(dt))
}

fn click<S: TemperatureSensor, A: BinaryActuator>(
    mut runner: Runner<S, A>,
    test: ActuatorSelfTest,
    between_ticks: impl FnMut(f64),
) -> Result<()> {
    let options = RunOptions {
        realtime: true,
        max_ticks: None,
    };
    let result = runner.self_test(test, options, between_ticks);
    runner.cleanup();

    match result? {
        None => {
            log::info!("Relay test complete");
            Ok(())
        }
        Some(kind) => anyhow::bail!("self-test aborted: {kind}"),
    }
}

fn check(config_path: &Path) -> Result<()> {
    let config = load(config_path)?;
    let profile = config.profile()?;
    let units = config.units.short();

    println!("{} steps, {:.0} s of soak time", profile.len(), profile.soak_time(0.0));
    for (step, kind) in profile.steps().iter().zip(profile.kinds(0.0)) {
        println!(
            "  {:<12} {:<4} {:>7.1} {units} {:>6.1} s",
            step.name,
            kind.as_str(),
            step.target,
            step.duration
        );
    }

    let pid = config.tuning.pid;
    println!(
        "pid kp={} ki={} kd={} min={:?} max={:?} windup_guard={:?}",
        pid.kp, pid.ki, pid.kd, pid.min, pid.max, pid.windup_guard
    );
    println!(
        "tick {} s, abort after {} faults, ramp buffer {} C",
        config.tuning.timer_period, config.tuning.fault_threshold, config.tuning.step_tolerance
    );
    println!(
        "thermocouple {} (read timeout {:?}), relay line {} active {}",
        hardware::spi_device_path(&config.pins).display(),
        hardware::sensor_timeout(config.tuning.timer_period),
        config.pins.relay,
        if config.pins.relay_active_high { "high" } else { "low" }
    );
    Ok(())
}
