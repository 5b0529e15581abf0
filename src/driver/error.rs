//! Error types for the lifecycle driver.

use thiserror::Error;

use crate::admin::AdminError;
use crate::dsn::DsnError;
use crate::emulator::EmulatorError;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors surfaced through [`Driver::ready`](crate::driver::Driver::ready).
///
/// Each variant names the phase that failed. `Clone` so that every concurrent
/// observer of a run receives the identical outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The DSN could not be parsed. Permanent; the caller must fix the input.
    #[error("failed to parse DSN: {0}")]
    Dsn(#[from] DsnError),

    /// The emulator failed to launch or never became reachable.
    #[error("emulator failed to start: {0}")]
    Startup(#[from] EmulatorError),

    /// The caller canceled the run before it reached a terminal state.
    #[error("run canceled before reaching readiness")]
    Canceled,

    /// Provisioning a logical resource failed with a non-"already exists"
    /// admin error.
    #[error("failed to provision {resource} {name:?}: {source}")]
    Provisioning {
        /// Kind of resource being provisioned ("instance" or "database").
        resource: &'static str,
        /// Full resource name.
        name: String,
        /// Underlying admin-API error.
        #[source]
        source: AdminError,
    },

    /// The configured DDL directory could not be read.
    #[error("failed to read ddl directory {path:?}: {reason}")]
    Ddl {
        /// Directory (or file) that failed.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_message_is_phase_neutral() {
        // Cancellation can land during provisioning too, after the ports
        // were already reachable, so the message must not claim otherwise.
        assert_eq!(
            DriverError::Canceled.to_string(),
            "run canceled before reaching readiness"
        );
    }
}
