//! Profile scheduler
//!
//! Runs a reflow profile tick by tick, records the samples of a run and
//! drives the actuator self-test.

pub mod executor;
pub mod samples;

pub use executor::{ProfileStateMachine, CONTROL_INTERVAL, DEFAULT_LOG_TARGET};
pub use samples::{Sample, SampleLog, CSV_HEADER};
pub use self_test::{ActuatorSelfTest, SelfTestStatus, SELF_TEST_DURATION};
