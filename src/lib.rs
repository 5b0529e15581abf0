//! Lifecycle driver for a containerized database emulator.
//!
//! This crate turns "a container was launched" into "the emulator, including
//! its logical instance and database, is ready for use" — and tears
//! everything down safely however the process ends. It coordinates three
//! concurrent actors:
//!
//! - the caller, who starts a run and awaits [`Driver::ready`];
//! - the supervised emulator process, owned by [`emulator::Supervisor`];
//! - a provisioning step that idempotently creates the instance and database
//!   through a narrow [`admin::AdminApi`] surface once the emulator's ports
//!   are reachable.
//!
//! Readiness is a one-shot broadcast: it settles exactly once per run, after
//! provisioning completes (success or failure), and every concurrent
//! observer sees the identical outcome.
//!
//! The admin client is constructed by the caller against an explicit
//! [`emulator::EmulatorEndpoint`]; this crate never reads or writes process
//! environment to route clients.

pub mod admin;
pub mod driver;
pub mod dsn;
pub mod emulator;
pub mod testing;

pub use admin::{AdminApi, AdminError, AdminOperation};
pub use driver::{Driver, DriverConfig, DriverError, DriverState, RunOptions};
pub use dsn::{DatabaseId, DsnError};
pub use emulator::{
    ContainerRuntime, DockerCli, EmulatorConfig, EmulatorEndpoint, EmulatorError, Hooks,
    LaunchSpec, Supervisor,
};
