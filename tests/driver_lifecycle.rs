//! End-to-end lifecycle scenarios for the driver.
//!
//! The emulator container is replaced by [`FakeRuntime`] (a local process
//! plus recorded stop requests) and the admin API by [`MockAdmin`], so these
//! tests exercise the real coordination paths — port polling, readiness
//! broadcast, provisioning, ordered teardown — without Docker.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use emukit::testing::{FakeRuntime, MockAdmin};
use emukit::{
    DatabaseId, Driver, DriverConfig, DriverError, DriverState, EmulatorConfig, EmulatorError,
    RunOptions,
};

const DSN: &str = "projects/test-project/instances/test-instance/databases/test-db";

fn no_drop() -> RunOptions {
    RunOptions {
        drop_database: false,
        ..Default::default()
    }
}

fn fast_emulator(grpc_port: u16, rest_port: u16, startup_timeout: Duration) -> EmulatorConfig {
    EmulatorConfig {
        grpc_port,
        rest_port,
        startup_timeout,
        poll_interval: Duration::from_millis(20),
        probe_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

/// A driver whose "emulator" is a sleeping process with two live listeners
/// standing in for the gRPC and REST ports.
struct TestBed {
    driver: Arc<Driver>,
    admin: Arc<MockAdmin>,
    runtime: Arc<FakeRuntime>,
    // Keep the listeners alive so port probes keep succeeding.
    _listeners: (TcpListener, TcpListener),
}

async fn reachable_driver(admin: Arc<MockAdmin>) -> TestBed {
    let grpc = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rest = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let runtime = Arc::new(FakeRuntime::sleeper());

    let config = DriverConfig {
        emulator: fast_emulator(
            grpc.local_addr().unwrap().port(),
            rest.local_addr().unwrap().port(),
            Duration::from_secs(5),
        ),
        runtime: runtime.clone(),
    };
    let driver = Arc::new(Driver::with_config(DSN, admin.clone(), config).unwrap());

    TestBed {
        driver,
        admin,
        runtime,
        _listeners: (grpc, rest),
    }
}

#[tokio::test]
async fn full_lifecycle_provisions_then_drops_on_shutdown() {
    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;
    let cancel = CancellationToken::new();

    let exited = bed.driver.run(&cancel, RunOptions::default()).await;
    bed.driver.ready().await.unwrap();

    assert!(matches!(bed.driver.state(), DriverState::Ready));
    assert_eq!(bed.admin.instance_creates(), 1);
    assert_eq!(bed.admin.database_creates(), 1);

    cancel.cancel();
    exited.await.unwrap().unwrap();

    // Exit hook dropped the provisioned database, then the container was
    // stopped.
    assert_eq!(bed.admin.dropped(), vec![DSN.to_string()]);
    assert_eq!(bed.runtime.stopped().len(), 1);
}

#[tokio::test]
async fn ready_blocks_before_run_and_returns_immediately_after() {
    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;

    // No run yet: ready must block.
    let blocked = tokio::time::timeout(Duration::from_millis(50), bed.driver.ready()).await;
    assert!(blocked.is_err());

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;

    // Settled: ready must resolve without waiting.
    tokio::time::timeout(Duration::from_millis(50), bed.driver.ready())
        .await
        .expect("ready should return immediately after the run settled")
        .unwrap();

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn concurrent_observers_see_identical_outcome() {
    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;

    let mut observers = Vec::new();
    for _ in 0..4 {
        let driver = Arc::clone(&bed.driver);
        observers.push(tokio::spawn(async move { driver.ready().await }));
    }

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;

    for observer in observers {
        observer.await.unwrap().unwrap();
    }

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn abandoned_observer_does_not_change_shared_outcome() {
    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;

    // This observer gives up while the driver is still NotStarted.
    let abandoned = tokio::time::timeout(Duration::from_millis(30), bed.driver.ready()).await;
    assert!(abandoned.is_err());

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;

    // Other observers still see the real outcome.
    bed.driver.ready().await.unwrap();

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn premature_exit_is_not_reported_as_timeout() {
    let runtime = Arc::new(FakeRuntime::failing());
    let config = DriverConfig {
        emulator: fast_emulator(41010, 41011, Duration::from_secs(5)),
        runtime: runtime.clone(),
    };
    let driver = Driver::with_config(DSN, Arc::new(MockAdmin::new()), config).unwrap();

    let cancel = CancellationToken::new();
    let exited = driver.run(&cancel, no_drop()).await;

    let err = driver.ready().await.unwrap_err();
    assert!(
        matches!(
            err,
            DriverError::Startup(EmulatorError::PrematureExit { .. })
        ),
        "{err}"
    );
    assert!(matches!(
        exited.await.unwrap(),
        Err(EmulatorError::PrematureExit { .. })
    ));
}

#[tokio::test]
async fn port_timeout_surfaces_through_ready_and_still_stops_container() {
    // A live process, but nothing ever listens on the probed ports.
    let runtime = Arc::new(FakeRuntime::sleeper());
    let config = DriverConfig {
        emulator: fast_emulator(41012, 41013, Duration::from_millis(300)),
        runtime: runtime.clone(),
    };
    let driver = Driver::with_config(DSN, Arc::new(MockAdmin::new()), config).unwrap();

    let cancel = CancellationToken::new();
    let exited = driver.run(&cancel, no_drop()).await;

    let err = driver.ready().await.unwrap_err();
    assert!(
        matches!(err, DriverError::Startup(EmulatorError::TimedOut { .. })),
        "{err}"
    );

    exited.await.unwrap().unwrap_err();
    assert_eq!(runtime.stopped().len(), 1);
}

#[tokio::test]
async fn canceling_before_ready_reports_cancellation() {
    let runtime = Arc::new(FakeRuntime::sleeper());
    let config = DriverConfig {
        emulator: fast_emulator(41014, 41015, Duration::from_secs(30)),
        runtime: runtime.clone(),
    };
    let driver = Arc::new(Driver::with_config(DSN, Arc::new(MockAdmin::new()), config).unwrap());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let exited = driver.run(&cancel, no_drop()).await;
    let err = driver.ready().await.unwrap_err();
    assert!(matches!(err, DriverError::Canceled), "{err}");

    // Cancellation still tears the process down cleanly.
    exited.await.unwrap().unwrap();
    assert_eq!(runtime.stopped().len(), 1);
}

#[tokio::test]
async fn disabling_drop_database_skips_the_drop_hook() {
    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;
    bed.driver.ready().await.unwrap();

    cancel.cancel();
    exited.await.unwrap().unwrap();

    // Teardown still stops the container, but the database survives.
    assert!(bed.admin.dropped().is_empty());
    assert_eq!(bed.runtime.stopped().len(), 1);
}

#[tokio::test]
async fn setup_is_idempotent_against_existing_resources() {
    let id = DatabaseId::parse(DSN).unwrap();
    let bed = reachable_driver(Arc::new(MockAdmin::with_existing(&id))).await;

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;
    bed.driver.ready().await.unwrap();

    // Both resources already existed: no create calls at all.
    assert_eq!(bed.admin.instance_creates(), 0);
    assert_eq!(bed.admin.database_creates(), 0);

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_run_reuses_provisioned_resources() {
    let admin = Arc::new(MockAdmin::new());

    let first = reachable_driver(admin.clone()).await;
    let cancel = CancellationToken::new();
    let exited = first.driver.run(&cancel, no_drop()).await;
    first.driver.ready().await.unwrap();
    cancel.cancel();
    exited.await.unwrap().unwrap();

    // New driver, same backend: lookups now succeed, so no new creates.
    let second = reachable_driver(admin.clone()).await;
    let cancel = CancellationToken::new();
    let exited = second.driver.run(&cancel, no_drop()).await;
    second.driver.ready().await.unwrap();

    assert_eq!(admin.instance_creates(), 1);
    assert_eq!(admin.database_creates(), 1);

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn failing_drop_hook_never_fails_the_run() {
    let admin = Arc::new(MockAdmin::new());
    admin.fail_drop();
    let bed = reachable_driver(admin).await;

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, RunOptions::default()).await;
    bed.driver.ready().await.unwrap();

    cancel.cancel();
    // The drop hook fails, but the exit signal is still a clean shutdown and
    // the container is still stopped.
    exited.await.unwrap().unwrap();
    assert!(bed.admin.dropped().is_empty());
    assert_eq!(bed.runtime.stopped().len(), 1);
}

#[tokio::test]
async fn provisioning_failure_is_shared_by_all_observers() {
    let admin = Arc::new(MockAdmin::new());
    admin.fail_create_database();
    let bed = reachable_driver(admin).await;

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;

    let first = bed.driver.ready().await.unwrap_err();
    let second = bed.driver.ready().await.unwrap_err();
    assert!(
        matches!(
            &first,
            DriverError::Provisioning {
                resource: "database",
                ..
            }
        ),
        "{first}"
    );
    assert_eq!(first, second);

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn non_not_found_lookup_error_is_fatal() {
    let admin = Arc::new(MockAdmin::new());
    admin.fail_lookups();
    let bed = reachable_driver(admin).await;

    let cancel = CancellationToken::new();
    let exited = bed.driver.run(&cancel, no_drop()).await;

    let err = bed.driver.ready().await.unwrap_err();
    assert!(
        matches!(
            err,
            DriverError::Provisioning {
                resource: "instance",
                ..
            }
        ),
        "{err}"
    );

    cancel.cancel();
    exited.await.unwrap().unwrap();
}

#[tokio::test]
async fn ddl_files_are_applied_in_lexical_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("20_users.sql"), "CREATE TABLE users").unwrap();
    std::fs::write(dir.path().join("10_schema.sql"), "CREATE TABLE schema_info").unwrap();
    std::fs::write(dir.path().join("README.md"), "not a statement").unwrap();

    let bed = reachable_driver(Arc::new(MockAdmin::new())).await;
    let cancel = CancellationToken::new();
    let options = RunOptions {
        drop_database: false,
        ddl_directory: Some(dir.path().to_path_buf()),
    };

    let exited = bed.driver.run(&cancel, options).await;
    bed.driver.ready().await.unwrap();

    assert_eq!(
        bed.admin.extra_statements(),
        vec![
            "CREATE TABLE schema_info".to_string(),
            "CREATE TABLE users".to_string(),
        ]
    );

    cancel.cancel();
    exited.await.unwrap().unwrap();
}
