//! Error types for the emulator supervisor.

use std::time::Duration;

use thiserror::Error;

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors that can occur while supervising the emulator process.
///
/// Cleanup-phase failures (exit hook, container stop) are deliberately not
/// represented here; they are logged and swallowed so they can never override
/// the already-decided outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulatorError {
    /// The emulator process could not be launched at all.
    #[error("failed to launch emulator process: {reason}")]
    Spawn {
        /// Reason for failure.
        reason: String,
    },

    /// The published ports never became reachable within the startup timeout.
    #[error("timed out after {timeout:?} waiting for emulator ports to become reachable")]
    TimedOut {
        /// The configured startup timeout.
        timeout: Duration,
    },

    /// The process exited before its ports became reachable.
    #[error("emulator exited before becoming ready: {reason}")]
    PrematureExit {
        /// Exit status or wait error of the process.
        reason: String,
    },
}
