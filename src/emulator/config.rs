//! Configuration types for the emulator supervisor.

use std::time::Duration;

/// Port the emulator's gRPC surface listens on inside the container.
pub const GRPC_CONTAINER_PORT: u16 = 9010;
/// Port the emulator's REST surface listens on inside the container.
pub const REST_CONTAINER_PORT: u16 = 9020;

/// Configuration for the supervised emulator container.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Container image to run.
    pub image: String,
    /// Host port published to the emulator's gRPC port.
    pub grpc_port: u16,
    /// Host port published to the emulator's REST port.
    pub rest_port: u16,
    /// Container name override. When `None`, a name is derived from the
    /// published ports.
    pub container_name: Option<String>,
    /// Whether to force-stop the container after the process exits.
    pub stop_container: bool,
    /// Overall time allowed for the published ports to become reachable.
    pub startup_timeout: Duration,
    /// Interval between port polls.
    pub poll_interval: Duration,
    /// Timeout for a single TCP connection probe.
    pub probe_timeout: Duration,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            image: "gcr.io/cloud-spanner-emulator/emulator".to_string(),
            grpc_port: GRPC_CONTAINER_PORT,
            rest_port: REST_CONTAINER_PORT,
            container_name: None,
            stop_container: true,
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

impl EmulatorConfig {
    /// The container name, derived from the published ports unless overridden.
    pub fn container_name(&self) -> String {
        match &self.container_name {
            Some(name) => name.clone(),
            None => format!("emukit-emulator-{}-{}", self.grpc_port, self.rest_port),
        }
    }

    /// Published port pairs as `(host_port, container_port)`.
    pub fn published_ports(&self) -> Vec<(u16, u16)> {
        vec![
            (self.grpc_port, GRPC_CONTAINER_PORT),
            (self.rest_port, REST_CONTAINER_PORT),
        ]
    }

    /// Endpoint of the emulator's gRPC surface on the host.
    ///
    /// This is the endpoint an [`AdminApi`](crate::admin::AdminApi)
    /// implementation should be constructed against.
    pub fn grpc_endpoint(&self) -> EmulatorEndpoint {
        EmulatorEndpoint {
            host: "127.0.0.1".to_string(),
            port: self.grpc_port,
            container_port: GRPC_CONTAINER_PORT,
        }
    }

    /// Endpoint of the emulator's REST surface on the host.
    pub fn rest_endpoint(&self) -> EmulatorEndpoint {
        EmulatorEndpoint {
            host: "127.0.0.1".to_string(),
            port: self.rest_port,
            container_port: REST_CONTAINER_PORT,
        }
    }
}

/// A host-side endpoint of the supervised emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorEndpoint {
    /// Host address (usually 127.0.0.1).
    pub host: String,
    /// Port on the host.
    pub port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

impl EmulatorEndpoint {
    /// The endpoint as a `host:port` address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The endpoint as an HTTP URL (for the REST surface).
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for EmulatorEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
