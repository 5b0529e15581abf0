//! Test doubles for driver wiring.
//!
//! Provides:
//! - [`MockAdmin`]: an in-memory [`AdminApi`] recording provisioning calls
//! - [`FakeRuntime`]: a [`ContainerRuntime`] that launches an arbitrary local
//!   process instead of a container and records stop requests
//!
//! Both are used by this crate's own tests and are exported for downstream
//! integration tests that want to exercise driver wiring without Docker.

use std::collections::HashSet;
use std::io;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::admin::{AdminApi, AdminError, AdminOperation, Result};
use crate::dsn::DatabaseId;
use crate::emulator::{ContainerRuntime, LaunchSpec};

#[derive(Default)]
struct MockState {
    instances: HashSet<String>,
    databases: HashSet<String>,
    instance_creates: u32,
    database_creates: u32,
    dropped: Vec<String>,
    extra_statements: Vec<String>,
    fail_drop: bool,
    fail_create_database: bool,
    fail_lookups: bool,
}

/// In-memory admin API. Lookups report [`AdminError::NotFound`] until the
/// matching create call runs; all calls are recorded for assertions.
#[derive(Default)]
pub struct MockAdmin {
    state: Mutex<MockState>,
}

impl MockAdmin {
    /// An empty admin backend: nothing exists yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// An admin backend where the identified instance and database already
    /// exist.
    pub fn with_existing(id: &DatabaseId) -> Self {
        let admin = Self::default();
        {
            let mut state = admin.state.lock().unwrap();
            state.instances.insert(id.instance_path());
            state.databases.insert(id.to_string());
        }
        admin
    }

    /// Make `drop_database` fail.
    pub fn fail_drop(&self) {
        self.state.lock().unwrap().fail_drop = true;
    }

    /// Make `create_database` fail.
    pub fn fail_create_database(&self) {
        self.state.lock().unwrap().fail_create_database = true;
    }

    /// Make lookups fail with a non-NotFound error.
    pub fn fail_lookups(&self) {
        self.state.lock().unwrap().fail_lookups = true;
    }

    /// Number of `create_instance` calls observed.
    pub fn instance_creates(&self) -> u32 {
        self.state.lock().unwrap().instance_creates
    }

    /// Number of `create_database` calls observed.
    pub fn database_creates(&self) -> u32 {
        self.state.lock().unwrap().database_creates
    }

    /// Databases dropped, in call order.
    pub fn dropped(&self) -> Vec<String> {
        self.state.lock().unwrap().dropped.clone()
    }

    /// Extra schema statements passed to the last `create_database` call.
    pub fn extra_statements(&self) -> Vec<String> {
        self.state.lock().unwrap().extra_statements.clone()
    }
}

#[async_trait]
impl AdminApi for MockAdmin {
    async fn get_instance(&self, name: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state.fail_lookups {
            return Err(AdminError::Api {
                reason: "lookup backend unavailable".to_string(),
            });
        }
        if state.instances.contains(name) {
            Ok(())
        } else {
            Err(AdminError::NotFound {
                name: name.to_string(),
            })
        }
    }

    async fn create_instance(&self, parent: &str, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.instance_creates += 1;
        state
            .instances
            .insert(format!("{parent}/instances/{instance_id}"));
        Ok(())
    }

    async fn get_database(&self, name: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state.fail_lookups {
            return Err(AdminError::Api {
                reason: "lookup backend unavailable".to_string(),
            });
        }
        if state.databases.contains(name) {
            Ok(())
        } else {
            Err(AdminError::NotFound {
                name: name.to_string(),
            })
        }
    }

    async fn create_database(
        &self,
        parent: &str,
        create_statement: &str,
        extra_statements: &[String],
    ) -> Result<Box<dyn AdminOperation>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_database {
            return Err(AdminError::Api {
                reason: "create database rejected".to_string(),
            });
        }
        state.database_creates += 1;
        state.extra_statements = extra_statements.to_vec();

        // Statement shape: CREATE DATABASE `<name>`
        let database = create_statement
            .split('`')
            .nth(1)
            .unwrap_or(create_statement);
        state
            .databases
            .insert(format!("{parent}/databases/{database}"));

        Ok(Box::new(ImmediateOperation(Ok(()))))
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_drop {
            return Err(AdminError::Api {
                reason: "drop rejected".to_string(),
            });
        }
        state.databases.remove(name);
        state.dropped.push(name.to_string());
        Ok(())
    }
}

/// An [`AdminOperation`] that is already complete.
pub struct ImmediateOperation(pub Result<()>);

#[async_trait]
impl AdminOperation for ImmediateOperation {
    async fn wait(self: Box<Self>) -> Result<()> {
        self.0
    }
}

/// A [`ContainerRuntime`] that launches an arbitrary local process in place
/// of a container and records stop requests instead of issuing them.
pub struct FakeRuntime {
    program: String,
    args: Vec<String>,
    stopped: Mutex<Vec<String>>,
}

impl FakeRuntime {
    /// Launch `program` with `args` for every [`LaunchSpec`].
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            stopped: Mutex::new(Vec::new()),
        }
    }

    /// A process that stays alive until killed.
    pub fn sleeper() -> Self {
        Self::new("sleep", &["30"])
    }

    /// A process that exits immediately with a failure status.
    pub fn failing() -> Self {
        Self::new("false", &[])
    }

    /// Container names passed to `stop`, in call order.
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn launch(&self, _spec: &LaunchSpec) -> io::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);
        cmd.spawn()
    }

    async fn stop(&self, name: &str) -> io::Result<()> {
        self.stopped.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
