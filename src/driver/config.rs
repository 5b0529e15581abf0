//! Configuration types for the lifecycle driver.

use std::path::PathBuf;
use std::sync::Arc;

use crate::emulator::{ContainerRuntime, DockerCli, EmulatorConfig};

/// Static wiring for a [`Driver`](crate::driver::Driver).
#[derive(Clone)]
pub struct DriverConfig {
    /// Emulator process configuration.
    pub emulator: EmulatorConfig,
    /// Container runtime used to launch and stop the emulator.
    pub runtime: Arc<dyn ContainerRuntime>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            emulator: EmulatorConfig::default(),
            runtime: Arc::new(DockerCli),
        }
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("emulator", &self.emulator)
            .finish_non_exhaustive()
    }
}

/// Per-run options, consumed once per [`Driver::run`](crate::driver::Driver::run).
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Whether the exit hook drops the provisioned database after the
    /// emulator terminates.
    pub drop_database: bool,
    /// Directory scanned (non-recursively) for `*.sql` files whose contents
    /// are applied as extra schema statements at database creation. Files
    /// are applied in lexical filename order.
    pub ddl_directory: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            drop_database: true,
            ddl_directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_drop_database_without_ddl() {
        let options = RunOptions::default();
        assert!(options.drop_database);
        assert!(options.ddl_directory.is_none());
    }
}
