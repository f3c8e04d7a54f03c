//! Instance table behaviour against the fake launcher.

use std::sync::Arc;
use std::time::Duration;

use comanda_core::domain::{NewRestaurant, SubscriptionStatus};
use comanda_core::repositories::{InMemoryRestaurantRepository, RestaurantRepository};
use comanda_core::{InstanceControl, PortRange, ProcessState};
use comanda_shared::TenantContext;
use comanda_supervisor::testing::FakeLauncher;
use comanda_supervisor::{InstanceRegistry, SupervisorError, SupervisorOptions};
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

fn options() -> SupervisorOptions {
    SupervisorOptions {
        startup_delay: Duration::from_millis(5),
        drain_timeout: Duration::from_millis(100),
        restart_grace: Duration::from_millis(500),
        readiness_timeout: None,
    }
}

fn registry() -> (InstanceRegistry, Arc<FakeLauncher>) {
    let launcher = Arc::new(FakeLauncher::new());
    (InstanceRegistry::new(launcher.clone(), options()), launcher)
}

fn tenant(port: u16) -> TenantContext {
    TenantContext {
        tenant_id: Uuid::new_v4(),
        port,
        subdomain: format!("casa-{}", port),
        name: format!("Casa {}", port),
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let (registry, launcher) = registry();
    let t = tenant(3001);

    let first = registry.start_tenant(&t).unwrap();
    let second = registry.start_tenant(&t).unwrap();

    assert_eq!(first.instance_id, second.instance_id);
    assert_eq!(first.pid, second.pid);
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(first.state(), ProcessState::Running);
}

#[tokio::test]
async fn test_launch_receives_tenant_identity() {
    let (registry, launcher) = registry();
    let t = tenant(3007);

    registry.start_tenant(&t).unwrap();

    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].tenant, t);
}

#[tokio::test]
async fn test_stop_removes_handle_immediately() {
    let (registry, launcher) = registry();
    let t = tenant(3001);
    let handle = registry.start_tenant(&t).unwrap();
    let pid = handle.pid.unwrap();

    let mut stopped = registry.stop_tenant(&t.tenant_id).unwrap();
    assert!(!registry.contains(&t.tenant_id));

    let state = timeout(WAIT, stopped.wait_for_exit()).await.unwrap();
    assert_eq!(state, ProcessState::Stopped);
    assert!(!launcher.is_alive(pid));
    assert_eq!(launcher.terminated(), vec![pid]);

    let exit = registry.exit_record(&t.tenant_id).unwrap();
    assert_eq!(exit.state, ProcessState::Stopped);
    assert_eq!(exit.code, Some(0));

    assert!(registry.stop_tenant(&t.tenant_id).is_none());
}

#[tokio::test]
async fn test_crash_removes_handle_without_restart() {
    let (registry, launcher) = registry();
    let t = tenant(3001);
    let mut handle = registry.start_tenant(&t).unwrap();

    assert!(launcher.crash(handle.pid.unwrap(), 3));

    let state = timeout(WAIT, handle.wait_for_exit()).await.unwrap();
    assert_eq!(state, ProcessState::Crashed);
    assert!(!registry.contains(&t.tenant_id));

    let exit = registry.exit_record(&t.tenant_id).unwrap();
    assert_eq!(exit.code, Some(3));
    assert_eq!(exit.instance_id, handle.instance_id);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(launcher.launch_count(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_stop_escalates_to_kill_after_drain_timeout() {
    let (registry, launcher) = registry();
    launcher.ignore_sigterm(true);
    let t = tenant(3001);
    registry.start_tenant(&t).unwrap();

    let mut stopped = registry.stop_tenant(&t.tenant_id).unwrap();
    let state = timeout(WAIT, stopped.wait_for_exit()).await.unwrap();

    assert_eq!(state, ProcessState::Stopped);
    let exit = registry.exit_record(&t.tenant_id).unwrap();
    assert_eq!(exit.code, None);
    assert_eq!(launcher.alive_count(), 0);
}

#[tokio::test]
async fn test_restart_keeps_port_with_new_pid() {
    let (registry, launcher) = registry();
    let t = tenant(3001);
    let first = registry.start_tenant(&t).unwrap();

    let second = registry.restart_tenant(&t).await.unwrap();

    assert_eq!(second.port, 3001);
    assert_ne!(second.pid, first.pid);
    assert_ne!(second.instance_id, first.instance_id);
    assert!(!launcher.is_alive(first.pid.unwrap()));
    assert_eq!(registry.handle(&t.tenant_id).unwrap().instance_id, second.instance_id);
}

#[tokio::test]
async fn test_old_instance_exit_does_not_evict_new_one() {
    let (registry, launcher) = registry();
    launcher.ignore_sigterm(true);
    let t = tenant(3001);
    let first = registry.start_tenant(&t).unwrap();

    // Old process lingers until the drain timeout kills it.
    registry.stop_tenant(&t.tenant_id);
    launcher.ignore_sigterm(false);
    let second = registry.start_tenant(&t).unwrap();
    assert_ne!(first.instance_id, second.instance_id);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!launcher.is_alive(first.pid.unwrap()));
    assert_eq!(registry.handle(&t.tenant_id).unwrap().instance_id, second.instance_id);
}

#[tokio::test]
async fn test_spawn_failure_is_an_error() {
    let (registry, launcher) = registry();
    launcher.fail_next_launch();
    let t = tenant(3001);

    let result = registry.start_tenant(&t);
    assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
    assert!(registry.is_empty());

    assert!(registry.start_tenant(&t).is_ok());
}

#[tokio::test]
async fn test_shutdown_all_stops_everything() {
    let (registry, launcher) = registry();
    for port in 3001..3005 {
        registry.start_tenant(&tenant(port)).unwrap();
    }
    assert_eq!(launcher.alive_count(), 4);

    registry.shutdown_all().await;

    assert!(registry.is_empty());
    assert_eq!(launcher.alive_count(), 0);
}

#[tokio::test]
async fn test_snapshots_sorted_by_port() {
    let (registry, _) = registry();
    registry.start_tenant(&tenant(3003)).unwrap();
    registry.start_tenant(&tenant(3001)).unwrap();

    let ports: Vec<u16> = registry.snapshots().iter().map(|s| s.port).collect();
    assert_eq!(ports, vec![3001, 3003]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_table_usable_while_spawn_in_flight() {
    let launcher = Arc::new(FakeLauncher::new());
    let registry = Arc::new(InstanceRegistry::new(launcher.clone(), options()));
    let t = tenant(3001);
    let gate = launcher.hold_next_launch();

    let starting = {
        let registry = registry.clone();
        let t = t.clone();
        tokio::task::spawn_blocking(move || registry.start_tenant(&t))
    };
    gate.entered.wait();

    assert!(matches!(registry.start_tenant(&t), Err(SupervisorError::Launching(_))));
    assert!(!registry.contains(&t.tenant_id));
    registry.start_tenant(&tenant(3002)).unwrap();
    assert_eq!(registry.len(), 1);

    gate.release.wait();
    let handle = starting.await.unwrap().unwrap();

    assert_eq!(registry.handle(&t.tenant_id).unwrap().instance_id, handle.instance_id);
    assert_eq!(registry.len(), 2);
    assert_eq!(launcher.launch_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_spawn_terminates_new_process() {
    let launcher = Arc::new(FakeLauncher::new());
    let registry = Arc::new(InstanceRegistry::new(launcher.clone(), options()));
    let t = tenant(3001);
    let gate = launcher.hold_next_launch();

    let starting = {
        let registry = registry.clone();
        let t = t.clone();
        tokio::task::spawn_blocking(move || registry.start_tenant(&t))
    };
    gate.entered.wait();

    assert!(registry.stop_tenant(&t.tenant_id).is_none());

    gate.release.wait();
    let mut handle = starting.await.unwrap().unwrap();

    let state = timeout(WAIT, handle.wait_for_exit()).await.unwrap();
    assert_eq!(state, ProcessState::Stopped);
    assert!(!registry.contains(&t.tenant_id));
    assert_eq!(launcher.alive_count(), 0);
}

fn readiness(limit: Duration) -> SupervisorOptions {
    SupervisorOptions {
        readiness_timeout: Some(limit),
        ..options()
    }
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_listening_instance_becomes_running() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let launcher = Arc::new(FakeLauncher::new());
    let registry = InstanceRegistry::new(launcher, readiness(Duration::from_secs(2)));
    let t = tenant(port);

    let handle = registry.start_tenant(&t).unwrap();
    assert_eq!(handle.state(), ProcessState::Starting);

    let running = timeout(WAIT, async {
        while handle.state() != ProcessState::Running {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(running.is_ok());
    drop(listener);
}

#[tokio::test]
async fn test_unready_instance_stays_starting() {
    let launcher = Arc::new(FakeLauncher::new());
    let registry = InstanceRegistry::new(launcher, readiness(Duration::from_millis(100)));
    let t = tenant(closed_port());

    registry.start_tenant(&t).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let handle = registry.handle(&t.tenant_id).unwrap();
    assert_eq!(handle.state(), ProcessState::Starting);
}

async fn seed(repo: &InMemoryRestaurantRepository, name: &str, status: SubscriptionStatus) -> comanda_core::Restaurant {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let new = NewRestaurant::new(name.into(), email, "hash".into(), None, None, status).unwrap();
    let ports = (status == SubscriptionStatus::Active).then(PortRange::default);
    repo.create(&new, ports).await.unwrap()
}

#[tokio::test]
async fn test_reconcile_starts_every_active_record() {
    let repo = InMemoryRestaurantRepository::new();
    let a = seed(&repo, "Bar A", SubscriptionStatus::Active).await;
    let b = seed(&repo, "Bar B", SubscriptionStatus::Active).await;
    let c = seed(&repo, "Bar C", SubscriptionStatus::Active).await;
    seed(&repo, "Bar D", SubscriptionStatus::Pending).await;

    let (registry, launcher) = registry();
    // First launch fails; reconciliation carries on.
    launcher.fail_next_launch();

    let report = registry.reconcile_on_startup(&repo).await.unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, a.id);
    assert_eq!(report.started, vec![b.id, c.id]);
    assert!(registry.contains(&b.id));
    assert!(registry.contains(&c.id));
    assert!(!registry.contains(&a.id));
}

#[tokio::test]
async fn test_instance_control_requires_port() {
    let repo = InMemoryRestaurantRepository::new();
    let pending = seed(&repo, "Bar P", SubscriptionStatus::Pending).await;
    let (registry, launcher) = registry();

    let result = InstanceControl::start(&registry, &pending);

    assert!(matches!(result, Err(comanda_core::DomainError::SpawnError(_))));
    assert_eq!(launcher.launch_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_launcher_runs_real_process() {
    use comanda_supervisor::CommandLauncher;

    let launcher = Arc::new(CommandLauncher::new(
        "/bin/sh",
        vec!["-c".into(), "echo listening on $TENANT_PORT; exec sleep 30".into()],
    ));
    let registry = InstanceRegistry::new(launcher, options());
    let t = tenant(3101);

    let handle = registry.start_tenant(&t).unwrap();
    assert!(handle.pid.is_some());

    let mut stopped = registry.stop_tenant(&t.tenant_id).unwrap();
    let state = timeout(WAIT, stopped.wait_for_exit()).await.unwrap();
    assert_eq!(state, ProcessState::Stopped);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_launcher_missing_binary() {
    use comanda_supervisor::CommandLauncher;

    let launcher = Arc::new(CommandLauncher::new("/nonexistent/tenant-server", Vec::new()));
    let registry = InstanceRegistry::new(launcher, options());

    let result = registry.start_tenant(&tenant(3102));
    assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
}
