//! Driver state machine: run, readiness observation, provisioning.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admin::AdminApi;
use crate::driver::config::{DriverConfig, RunOptions};
use crate::driver::error::{DriverError, Result};
use crate::dsn::DatabaseId;
use crate::emulator::{EmulatorError, Hooks, Supervisor};

/// Lifecycle state of a driver run.
#[derive(Debug, Clone, Default)]
pub enum DriverState {
    /// No run has been started.
    #[default]
    NotStarted,
    /// The supervisor was spawned; waiting for ports to become reachable.
    Starting,
    /// Ports are reachable; logical resources are being provisioned.
    SettingUp,
    /// Provisioning succeeded. Terminal for the run.
    Ready,
    /// The run failed. Terminal for the run.
    Failed(DriverError),
}

/// Coordinates the emulator process, provisioning, and readiness observers.
///
/// One driver supervises one emulator and the logical database named by its
/// DSN. [`Driver::run`] starts the emulator and provisions the instance and
/// database once its ports are reachable; any number of tasks may await
/// [`Driver::ready`] and all observe the identical outcome.
///
/// The emulator endpoint is threaded explicitly: construct the [`AdminApi`]
/// client against [`EmulatorConfig::grpc_endpoint`] — no process-global
/// environment is consulted or mutated.
///
/// [`EmulatorConfig::grpc_endpoint`]: crate::emulator::EmulatorConfig::grpc_endpoint
pub struct Driver {
    dsn: String,
    id: DatabaseId,
    admin: Arc<dyn AdminApi>,
    config: DriverConfig,
    state: watch::Sender<DriverState>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("dsn", &self.dsn)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver with default configuration.
    ///
    /// Fails if the DSN is malformed.
    pub fn new(dsn: &str, admin: Arc<dyn AdminApi>) -> Result<Self> {
        Self::with_config(dsn, admin, DriverConfig::default())
    }

    /// Create a driver with explicit configuration.
    pub fn with_config(dsn: &str, admin: Arc<dyn AdminApi>, config: DriverConfig) -> Result<Self> {
        let id = DatabaseId::parse(dsn)?;
        Ok(Self {
            dsn: dsn.to_string(),
            id,
            admin,
            config,
            state: watch::Sender::new(DriverState::NotStarted),
        })
    }

    /// The parsed identifier behind this driver's DSN.
    pub fn id(&self) -> &DatabaseId {
        &self.id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state.borrow().clone()
    }

    /// Start the emulator and provision its logical resources.
    ///
    /// Returns once the run reaches a terminal state (`Ready` or `Failed`);
    /// the returned handle completes when the supervised process has fully
    /// exited and teardown has finished. Canceling `cancel` terminates the
    /// process and tears it down in the supervisor's fixed order.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        options: RunOptions,
    ) -> JoinHandle<std::result::Result<(), EmulatorError>> {
        self.state.send_replace(DriverState::Starting);

        let (ready_tx, mut ready_rx) = oneshot::channel();
        let mut hooks = Hooks {
            on_ready: Some(Box::new(move || {
                let _ = ready_tx.send(());
            })),
            on_exit: None,
        };

        if options.drop_database {
            let admin = Arc::clone(&self.admin);
            let dsn = self.dsn.clone();
            hooks.on_exit = Some(Box::new(move || {
                Box::pin(async move {
                    tracing::info!(database = %dsn, "dropping database");
                    admin.drop_database(&dsn).await?;
                    Ok(())
                })
            }));
        }

        let supervisor = Supervisor::new(
            self.config.emulator.clone(),
            Arc::clone(&self.config.runtime),
            hooks,
        );
        let supervisor_cancel = cancel.child_token();

        let (exit_tx, mut exit_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let res = supervisor.run(supervisor_cancel).await;
            let _ = exit_tx.send(res.clone());
            res
        });

        enum Phase {
            Canceled,
            Ready,
            SupervisorEnded(Option<std::result::Result<(), EmulatorError>>),
        }

        // Readiness is checked before exit so that a process dying right
        // after its ports opened still goes through setup.
        let phase = tokio::select! {
            biased;
            _ = cancel.cancelled() => Phase::Canceled,
            res = &mut ready_rx => match res {
                Ok(()) => Phase::Ready,
                // Readiness channel closed without firing: the supervisor is
                // winding down. Its result tells us why.
                Err(_) => Phase::SupervisorEnded(None),
            },
            res = &mut exit_rx => Phase::SupervisorEnded(Some(res.unwrap_or_else(|_| {
                Err(EmulatorError::Spawn {
                    reason: "supervisor task terminated unexpectedly".to_string(),
                })
            }))),
        };

        match phase {
            Phase::Canceled => self.settle(Err(DriverError::Canceled)),
            Phase::SupervisorEnded(res) => {
                let res = match res {
                    Some(res) => res,
                    None => exit_rx.await.unwrap_or_else(|_| {
                        Err(EmulatorError::Spawn {
                            reason: "supervisor task terminated unexpectedly".to_string(),
                        })
                    }),
                };
                self.settle(Err(startup_error(res)));
            }
            Phase::Ready => {
                self.state.send_replace(DriverState::SettingUp);
                tracing::debug!(database = %self.dsn, "emulator ready, provisioning logical resources");

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(DriverError::Canceled),
                    res = self.setup(&options) => res,
                };
                self.settle(outcome);
            }
        }

        handle
    }

    /// Wait until the current run reaches a terminal state and return its
    /// outcome.
    ///
    /// Returns immediately if the run already settled. Any number of
    /// observers may wait concurrently; abandoning the returned future (for
    /// example inside `tokio::select!` or `tokio::time::timeout`) affects
    /// only that observer, never the shared outcome.
    pub async fn ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                DriverState::Ready => return Ok(()),
                DriverState::Failed(err) => return Err(err.clone()),
                _ => {}
            }
            if rx.changed().await.is_err() {
                // The sender lives in `self`, so this only happens if the
                // driver is torn down mid-observation.
                return Err(DriverError::Canceled);
            }
        }
    }

    /// Record the terminal outcome of the run and wake every observer.
    fn settle(&self, outcome: Result<()>) {
        let next = match outcome {
            Ok(()) => {
                tracing::info!(database = %self.dsn, "emulator ready");
                DriverState::Ready
            }
            Err(err) => {
                tracing::warn!(database = %self.dsn, error = %err, "emulator run failed");
                DriverState::Failed(err)
            }
        };
        self.state.send_replace(next);
    }

    /// Idempotently provision the logical instance, then the database.
    async fn setup(&self, options: &RunOptions) -> Result<()> {
        self.ensure_instance().await?;
        self.ensure_database(options).await?;
        Ok(())
    }

    async fn ensure_instance(&self) -> Result<()> {
        let name = self.id.instance_path();
        match self.admin.get_instance(&name).await {
            Ok(()) => {
                tracing::debug!(instance = %name, "instance already exists");
                return Ok(());
            }
            Err(err) if err.is_not_found() => {}
            Err(source) => {
                return Err(DriverError::Provisioning {
                    resource: "instance",
                    name,
                    source,
                });
            }
        }

        self.admin
            .create_instance(&self.id.project_path(), &self.id.instance)
            .await
            .map_err(|source| DriverError::Provisioning {
                resource: "instance",
                name,
                source,
            })
    }

    async fn ensure_database(&self, options: &RunOptions) -> Result<()> {
        match self.admin.get_database(&self.dsn).await {
            Ok(()) => {
                tracing::info!(database = %self.dsn, "database already exists");
                return Ok(());
            }
            Err(err) if err.is_not_found() => {}
            Err(source) => {
                return Err(DriverError::Provisioning {
                    resource: "database",
                    name: self.dsn.clone(),
                    source,
                });
            }
        }

        let extra_statements = match &options.ddl_directory {
            Some(dir) => load_ddl_statements(dir).await?,
            None => Vec::new(),
        };

        let create_statement = format!("CREATE DATABASE `{}`", self.id.database);
        let operation = self
            .admin
            .create_database(&self.id.instance_path(), &create_statement, &extra_statements)
            .await
            .map_err(|source| DriverError::Provisioning {
                resource: "database",
                name: self.dsn.clone(),
                source,
            })?;

        // Creation is an asynchronous remote operation; the database is not
        // usable until it reports completion.
        operation
            .wait()
            .await
            .map_err(|source| DriverError::Provisioning {
                resource: "database",
                name: self.dsn.clone(),
                source,
            })
    }
}

fn startup_error(res: std::result::Result<(), EmulatorError>) -> DriverError {
    match res {
        // The supervisor only returns Ok before readiness when it was
        // canceled out from under us.
        Ok(()) => DriverError::Canceled,
        Err(err) => DriverError::Startup(err),
    }
}

/// Collect `*.sql` files from `dir` (non-recursively), one extra statement
/// per file, in lexical filename order.
async fn load_ddl_statements(dir: &Path) -> Result<Vec<String>> {
    let ddl_err = |path: &Path, err: std::io::Error| DriverError::Ddl {
        path: path.display().to_string(),
        reason: err.to_string(),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| ddl_err(dir, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ddl_err(dir, e))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| ddl_err(&path, e))?;
        if !file_type.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
            continue;
        }
        paths.push(path);
    }
    // Directory listing order is platform-dependent; sort so schema
    // statements are applied deterministically.
    paths.sort();

    let mut statements = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ddl_err(&path, e))?;
        statements.push(contents);
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::MockAdmin;

    #[test]
    fn new_rejects_malformed_dsn() {
        let err = Driver::new("projects/p1/instances/i1", Arc::new(MockAdmin::new())).unwrap_err();
        assert!(matches!(err, DriverError::Dsn(_)), "{err}");
    }

    #[test]
    fn initial_state_is_not_started() {
        let driver = Driver::new(
            "projects/p1/instances/i1/databases/d1",
            Arc::new(MockAdmin::new()),
        )
        .unwrap();
        assert!(matches!(driver.state(), DriverState::NotStarted));
    }

    #[tokio::test]
    async fn ddl_statements_are_sorted_lexically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.sql"), "CREATE TABLE b (id INT64)").unwrap();
        std::fs::write(dir.path().join("a.sql"), "CREATE TABLE a (id INT64)").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let statements = load_ddl_statements(dir.path()).await.unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (id INT64)".to_string(),
                "CREATE TABLE b (id INT64)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_ddl_directory_is_fatal() {
        let err = load_ddl_statements(Path::new("/nonexistent/ddl"))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Ddl { .. }), "{err}");
    }
}
