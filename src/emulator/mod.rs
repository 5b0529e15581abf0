//! Supervision of the external emulator process.
//!
//! The supervisor owns the full lifetime of one emulator container and
//! surfaces two events: "ports reachable" (at most once, via
//! [`Hooks::on_ready`]) and "process exited" (the completion of
//! [`Supervisor::run`]).
//!
//! ```text
//! launch ──▶ poll ports ──▶ on_ready ──▶ hold until cancel
//!              │                              │
//!              │ (exit / timeout)             ▼
//!              ▼                        process exit
//!        ordered teardown  ◀──────────────────┘
//!        (exit hook, then container stop)
//! ```
//!
//! Container invocation is behind the [`ContainerRuntime`] seam; the default
//! [`DockerCli`] shells out to `docker run` / `docker stop`.

pub mod config;
pub mod error;
pub mod runtime;
pub mod supervisor;

pub use config::{EmulatorConfig, EmulatorEndpoint, GRPC_CONTAINER_PORT, REST_CONTAINER_PORT};
pub use error::{EmulatorError, Result};
pub use runtime::{ContainerRuntime, DockerCli, LaunchSpec};
pub use supervisor::{ExitHook, Hooks, Supervisor};
