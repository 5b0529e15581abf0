//! Container runtime seam.
//!
//! The supervisor consumes a deliberately small capability surface: launch a
//! named, removable container publishing host ports, observe the resulting
//! process, and forcibly stop a named container. [`DockerCli`] is the default
//! implementation shelling out to the `docker` binary; tests substitute their
//! own [`ContainerRuntime`] to run arbitrary local processes instead.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};

/// What to launch: image, container name and published ports.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Container image to run.
    pub image: String,
    /// Name assigned to the container.
    pub container_name: String,
    /// Published ports as `(host_port, container_port)`.
    pub ports: Vec<(u16, u16)>,
}

/// Capability surface required of the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Launch the container, returning the handle of the supervising process.
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child>;

    /// Forcibly stop a named container.
    async fn stop(&self, name: &str) -> io::Result<()>;
}

#[async_trait]
impl<T: ContainerRuntime + ?Sized> ContainerRuntime for Arc<T> {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child> {
        (**self).launch(spec)
    }

    async fn stop(&self, name: &str) -> io::Result<()> {
        (**self).stop(name).await
    }
}

/// Default runtime driving the `docker` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli;

#[async_trait]
impl ContainerRuntime for DockerCli {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child> {
        let mut cmd = Command::new("docker");
        cmd.args(["run", "-i", "--rm"]);
        for (host_port, container_port) in &spec.ports {
            cmd.arg("-p").arg(format!("{host_port}:{container_port}"));
        }
        cmd.arg("--name").arg(&spec.container_name);
        cmd.arg(&spec.image);
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        // Last-resort teardown if the supervisor future is dropped.
        cmd.kill_on_drop(true);
        cmd.spawn()
    }

    async fn stop(&self, name: &str) -> io::Result<()> {
        let output = Command::new("docker").args(["stop", name]).output().await?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "docker stop {name:?} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
