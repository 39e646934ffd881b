//! Events that trigger run status transitions

/// Events that can trigger status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    // Operator commands
    /// Begin a run from step 0
    Start,
    /// Abort the run (or the self-test)
    Stop,
    /// Freeze the run clock
    Pause,
    /// Continue a paused run
    Resume,
    /// Enter actuator self-test
    BeginSelfTest,

    // Executor events
    /// The final step completed
    ProfileFinished,
}
