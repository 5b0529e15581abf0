//! Lifecycle coordination between the caller, the supervised emulator
//! process, and resource provisioning.
//!
//! The [`Driver`] owns one readiness cell observed by any number of
//! concurrent [`Driver::ready`] callers. A run moves through
//! `NotStarted → Starting → SettingUp → Ready | Failed`; readiness is
//! broadcast only after provisioning fully completes, and every observer
//! sees the identical outcome.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use emukit::{Driver, RunOptions};
//! # use emukit::testing::MockAdmin;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let admin = Arc::new(MockAdmin::new());
//! let driver = Driver::new("projects/p1/instances/i1/databases/d1", admin)?;
//! let cancel = CancellationToken::new();
//!
//! let exited = driver.run(&cancel, RunOptions::default()).await;
//! driver.ready().await?;
//!
//! // ... run tests against the emulator ...
//!
//! cancel.cancel();
//! exited.await??;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;

pub use config::{DriverConfig, RunOptions};
pub use error::{DriverError, Result};
pub use manager::{Driver, DriverState};
