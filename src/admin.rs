//! Narrow administrative-API surface used for provisioning.
//!
//! The concrete admin client (gRPC, REST, in-memory) is an external
//! collaborator; the driver only consumes the capability surface below:
//! lookup-by-name with a distinguishable "not found", create calls, and a
//! wait-for-completion handle for asynchronous operations.
//!
//! Implementations are constructed by the caller against an explicit
//! [`EmulatorEndpoint`](crate::emulator::EmulatorEndpoint) taken from
//! [`EmulatorConfig`](crate::emulator::EmulatorConfig); the driver never
//! routes clients through process-global environment.

use async_trait::async_trait;
use thiserror::Error;

/// Result type for admin-API operations.
pub type Result<T> = std::result::Result<T, AdminError>;

/// Errors surfaced by an [`AdminApi`] implementation.
///
/// `NotFound` is the only condition provisioning treats as recoverable;
/// everything else aborts the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The named resource does not exist.
    #[error("resource {name:?} not found")]
    NotFound {
        /// Full resource name that was looked up.
        name: String,
    },

    /// Any other API failure.
    #[error("admin api call failed: {reason}")]
    Api {
        /// Reason for failure.
        reason: String,
    },
}

impl AdminError {
    /// Whether this error is the recoverable "resource not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound { .. })
    }
}

/// Completion handle for an asynchronous remote operation.
///
/// Database creation is a long-running operation on the server; callers must
/// wait for its completion signal before treating the resource as usable.
#[async_trait]
pub trait AdminOperation: Send {
    /// Block until the operation completes, consuming the handle.
    async fn wait(self: Box<Self>) -> Result<()>;
}

/// Capability surface the driver requires of an administrative client.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Look up an instance by full resource name
    /// (`projects/<P>/instances/<I>`).
    async fn get_instance(&self, name: &str) -> Result<()>;

    /// Create an instance under the given project path (`projects/<P>`).
    async fn create_instance(&self, parent: &str, instance_id: &str) -> Result<()>;

    /// Look up a database by full resource name
    /// (`projects/<P>/instances/<I>/databases/<D>`).
    async fn get_database(&self, name: &str) -> Result<()>;

    /// Create a database under the given instance path. `extra_statements`
    /// are independent schema statements applied at creation time.
    async fn create_database(
        &self,
        parent: &str,
        create_statement: &str,
        extra_statements: &[String],
    ) -> Result<Box<dyn AdminOperation>>;

    /// Drop a database by full resource name.
    async fn drop_database(&self, name: &str) -> Result<()>;
}
