//! Sensor fault tracking and abort policy
//!
//! The executor records the outcome of every sensor read; the caller owns
//! the policy of comparing the recent fault count against a threshold and
//! stopping the run.

use core::fmt;

use heapless::HistoryBuffer;

use crate::traits::SensorFault;

/// Number of sensor read outcomes kept
pub const FAULT_HISTORY_LEN: usize = 10;

/// Recent faults at which a run is aborted
pub const DEFAULT_FAULT_THRESHOLD: usize = 5;

/// Safety condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStatus {
    /// All conditions normal
    Ok,
    /// Safety condition violated
    Fault(FaultKind),
}

/// Types of faults that end a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Too many recent thermocouple read failures
    ThermocoupleFaults {
        /// Failed reads among the last [`FAULT_HISTORY_LEN`]
        recent: usize,
    },
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::ThermocoupleFaults { recent } => write!(
                f,
                "{recent} of the last {FAULT_HISTORY_LEN} thermocouple reads failed, \
                 check the thermocouple and its connection"
            ),
        }
    }
}

/// Fixed-size history of sensor read outcomes
///
/// `None` marks a successful read. Starts full of successes so the count
/// is meaningful from the first tick.
pub struct FaultHistory {
    reads: HistoryBuffer<Option<SensorFault>, FAULT_HISTORY_LEN>,
}

impl Default for FaultHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultHistory {
    /// Create a history with no recorded faults
    pub fn new() -> Self {
        Self {
            reads: HistoryBuffer::new_with(None),
        }
    }

    /// Record one read outcome, evicting the oldest
    pub fn record(&mut self, outcome: Option<SensorFault>) {
        self.reads.write(outcome);
    }

    /// Number of failed reads in the history
    pub fn recent_error_count(&self) -> usize {
        self.reads.as_slice().iter().filter(|r| r.is_some()).count()
    }

    /// Fault from the most recent read, if it failed
    pub fn last_fault(&self) -> Option<SensorFault> {
        self.reads.recent().copied().flatten()
    }

    /// Outcomes from oldest to newest
    pub fn outcomes(&self) -> impl Iterator<Item = &Option<SensorFault>> {
        self.reads.oldest_ordered()
    }

    /// Forget all recorded faults
    pub fn clear(&mut self) {
        self.reads.clear_with(None);
    }
}

impl fmt::Debug for FaultHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.outcomes()).finish()
    }
}

/// Abort policy for sensor faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFaultPolicy {
    /// Recent faults at which the run must stop
    pub threshold: usize,
}

impl Default for SensorFaultPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FAULT_THRESHOLD,
        }
    }
}

impl SensorFaultPolicy {
    /// Create a policy with a custom threshold
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Check the recent fault count against the threshold
    pub fn check(&self, recent_error_count: usize) -> SafetyStatus {
        if recent_error_count >= self.threshold {
            SafetyStatus::Fault(FaultKind::ThermocoupleFaults {
                recent: recent_error_count,
            })
        } else {
            SafetyStatus::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_history_is_clean() {
        let history = FaultHistory::new();
        assert_eq!(history.recent_error_count(), 0);
        assert_eq!(history.outcomes().count(), FAULT_HISTORY_LEN);
        assert_eq!(history.last_fault(), None);
    }

    #[test]
    fn test_faults_are_counted() {
        let mut history = FaultHistory::new();
        history.record(Some(SensorFault::NoThermocouple));
        history.record(None);
        history.record(Some(SensorFault::ShortToGround));
        assert_eq!(history.recent_error_count(), 2);
        assert_eq!(history.last_fault(), Some(SensorFault::ShortToGround));
    }

    #[test]
    fn test_old_faults_are_evicted() {
        let mut history = FaultHistory::new();
        for _ in 0..FAULT_HISTORY_LEN {
            history.record(Some(SensorFault::Bus));
        }
        assert_eq!(history.recent_error_count(), FAULT_HISTORY_LEN);

        for _ in 0..FAULT_HISTORY_LEN - 3 {
            history.record(None);
        }
        assert_eq!(history.recent_error_count(), 3);
        assert_eq!(history.last_fault(), None);
    }

    #[test]
    fn test_clear() {
        let mut history = FaultHistory::new();
        history.record(Some(SensorFault::Timeout));
        history.clear();
        assert_eq!(history.recent_error_count(), 0);
        assert_eq!(history.outcomes().count(), FAULT_HISTORY_LEN);
    }

    #[test]
    fn test_policy_threshold() {
        let policy = SensorFaultPolicy::default();
        assert_eq!(policy.check(4), SafetyStatus::Ok);
        assert_eq!(
            policy.check(5),
            SafetyStatus::Fault(FaultKind::ThermocoupleFaults { recent: 5 })
        );
    }

    #[test]
    fn test_fault_message() {
        let kind = FaultKind::ThermocoupleFaults { recent: 6 };
        assert!(kind.to_string().starts_with("6 of the last 10"));
    }
}
