//! Emulator process supervision.
//!
//! [`Supervisor::run`] owns the full lifetime of the emulator process: it
//! launches the container, polls the published ports until they all accept
//! connections (or a timeout elapses, or the process dies first), fires the
//! readiness hook exactly once, then holds until cancellation and tears the
//! process down in a fixed order.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::emulator::config::EmulatorConfig;
use crate::emulator::error::{EmulatorError, Result};
use crate::emulator::runtime::{ContainerRuntime, LaunchSpec};

/// Best-effort cleanup callback run after the process exits, before the
/// container is stopped.
pub type ExitHook = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Callbacks surfaced by the supervisor at lifecycle edges.
#[derive(Default)]
pub struct Hooks {
    /// Fired exactly once when all published ports accept connections.
    pub on_ready: Option<Box<dyn FnOnce() + Send>>,
    /// Run after the process exits, before container stop. Failures are
    /// logged, never propagated.
    pub on_exit: Option<ExitHook>,
}

/// Supervises one emulator process from launch to teardown.
pub struct Supervisor<R> {
    config: EmulatorConfig,
    runtime: R,
    hooks: Hooks,
}

impl<R: ContainerRuntime> Supervisor<R> {
    /// Create a supervisor for the given configuration and runtime.
    pub fn new(config: EmulatorConfig, runtime: R, hooks: Hooks) -> Self {
        Self {
            config,
            runtime,
            hooks,
        }
    }

    /// Run the emulator process to completion.
    ///
    /// Resolves only after the process has exited and teardown has finished.
    /// Returns `Ok(())` when the run ended through cancellation (or the
    /// process exited on its own after becoming ready); startup failures are
    /// reported as [`EmulatorError`].
    ///
    /// Teardown order is fixed: process exit, then the exit hook, then
    /// container stop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let spec = LaunchSpec {
            image: self.config.image.clone(),
            container_name: self.config.container_name(),
            ports: self.config.published_ports(),
        };

        let mut child = self
            .runtime
            .launch(&spec)
            .map_err(|err| EmulatorError::Spawn {
                reason: err.to_string(),
            })?;
        tracing::info!(
            container = %spec.container_name,
            image = %spec.image,
            "emulator process launched"
        );

        let became_ready = tokio::select! {
            _ = cancel.cancelled() => None,
            res = Self::wait_for_ports(&mut child, &self.config) => Some(res),
        };

        match became_ready {
            None => {
                tracing::debug!("canceled before the emulator became ready");
                self.shutdown(&mut child, &spec.container_name).await;
                Ok(())
            }
            Some(Err(err)) => {
                self.shutdown(&mut child, &spec.container_name).await;
                Err(err)
            }
            Some(Ok(())) => {
                tracing::info!("emulator ports are reachable");
                if let Some(on_ready) = self.hooks.on_ready.take() {
                    on_ready();
                }

                tokio::select! {
                    _ = cancel.cancelled() => {}
                    status = child.wait() => {
                        tracing::warn!(?status, "emulator exited before shutdown was requested");
                    }
                }
                self.shutdown(&mut child, &spec.container_name).await;
                Ok(())
            }
        }
    }

    /// Poll every published host port until all accept a TCP connection.
    async fn wait_for_ports(child: &mut Child, config: &EmulatorConfig) -> Result<()> {
        let deadline = Instant::now() + config.startup_timeout;
        let addrs: Vec<String> = config
            .published_ports()
            .iter()
            .map(|(host_port, _)| format!("127.0.0.1:{host_port}"))
            .collect();

        loop {
            tokio::select! {
                status = child.wait() => {
                    let reason = match status {
                        Ok(status) => status.to_string(),
                        Err(err) => err.to_string(),
                    };
                    return Err(EmulatorError::PrematureExit { reason });
                }
                _ = tokio::time::sleep(config.poll_interval) => {}
            }

            if Instant::now() >= deadline {
                return Err(EmulatorError::TimedOut {
                    timeout: config.startup_timeout,
                });
            }

            if all_ports_open(&addrs, config.probe_timeout).await {
                return Ok(());
            }
        }
    }

    /// Bring the process down (if still running) and run ordered teardown.
    async fn shutdown(&mut self, child: &mut Child, container_name: &str) {
        if child.id().is_some() {
            best_effort("killing emulator process", child.start_kill());
            if let Err(err) = child.wait().await {
                tracing::warn!(error = %err, "failed to reap emulator process");
            }
        }

        if let Some(on_exit) = self.hooks.on_exit.take() {
            best_effort("exit hook", on_exit().await);
        }

        if self.config.stop_container {
            best_effort(
                "stopping emulator container",
                self.runtime.stop(container_name).await,
            );
        }
    }
}

/// Probe each address with a short-timeout TCP connect.
async fn all_ports_open(addrs: &[String], probe_timeout: Duration) -> bool {
    for addr in addrs {
        match tokio::time::timeout(probe_timeout, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::trace!(%addr, error = %err, "port not reachable yet");
                return false;
            }
            Err(_) => {
                tracing::trace!(%addr, "port probe timed out");
                return false;
            }
        }
    }
    true
}

/// Cleanup contract: failures are logged and swallowed, never propagated.
///
/// Teardown must not fail the caller's flow after the primary outcome of a
/// run has already been decided.
fn best_effort<E: fmt::Display>(what: &str, res: std::result::Result<(), E>) {
    if let Err(err) = res {
        tracing::warn!(error = %err, "{what} failed");
    }
}
