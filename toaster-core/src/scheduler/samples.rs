//! Recorded run samples and CSV export

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Column names of the exported sample log, in order
pub const CSV_HEADER: [&str; 9] = [
    "Timestamp",
    "Temperature",
    "TargetTemperature",
    "State",
    "ActuatorState",
    "PIDOutput",
    "PIDError",
    "PIDIError",
    "PIDDError",
];

/// One control-cadence measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Run time in seconds
    pub timestamp: f64,
    /// Measured temperature in display units
    pub temperature: f64,
    /// Active target in display units
    pub target: f64,
    /// Active step name
    pub step: String,
    /// Actuator state after actuation
    pub actuator_on: bool,
    pub pid_output: f64,
    pub pid_error: f64,
    pub pid_i_error: f64,
    pub pid_d_error: f64,
}

/// Append-only list of samples for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleLog {
    samples: Vec<Sample>,
}

impl SampleLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in chronological order
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Write the log as CSV, header first
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", CSV_HEADER.join(","))?;
        for s in &self.samples {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{}",
                s.timestamp,
                s.temperature,
                s.target,
                escape_field(&s.step),
                s.actuator_on,
                s.pid_output,
                s.pid_error,
                s.pid_i_error,
                s.pid_d_error
            )?;
        }
        out.flush()
    }

    /// Export to `path`
    ///
    /// Returns `Ok(false)` without touching the filesystem when nothing has
    /// been recorded.
    pub fn dump(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        if self.samples.is_empty() {
            return Ok(false);
        }
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))?;
        Ok(true)
    }
}

// Quote fields containing separators, doubling embedded quotes
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
