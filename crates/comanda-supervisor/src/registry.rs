// ============================================================================
// Comanda Supervisor - Instance Registry
// File: crates/comanda-supervisor/src/registry.rs
// Description: Instance table, exit watchers, stop/restart/shutdown
// ============================================================================
//! Instance table.
//!
//! At most one handle exists per tenant id. `start_tenant` claims the slot
//! with a `Launching` marker through the map's entry API and spawns with no
//! shard lock held; a concurrent second start sees the marker or the first
//! handle instead of spawning again. Every handle has a watcher
//! task that owns the process, publishes its [`ProcessState`], and on exit
//! removes the handle only if it still belongs to the same instance.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use comanda_core::{DomainError, ExitRecord, InstanceControl, InstanceSnapshot, ProcessState, Restaurant};
use comanda_shared::config::SupervisorSettings;
use comanda_shared::{TenantContext, TenantId};

use crate::error::SupervisorError;
use crate::launcher::{Launcher, ProcessHandle};

const READINESS_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Pause between consecutive starts during reconciliation.
    pub startup_delay: Duration,
    /// Time a stopped process gets before it is killed.
    pub drain_timeout: Duration,
    /// Time `restart` waits for the old process before starting the new one.
    pub restart_grace: Duration,
    /// `None` marks instances running right after spawn. With a limit, an
    /// instance stays `Starting` until its port accepts a connection; one
    /// that never does within the limit is left `Starting`.
    pub readiness_timeout: Option<Duration>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(comanda_shared::constants::DEFAULT_STARTUP_DELAY_MS),
            drain_timeout: Duration::from_secs(comanda_shared::constants::DEFAULT_DRAIN_TIMEOUT_SECS),
            restart_grace: Duration::from_secs(comanda_shared::constants::DEFAULT_RESTART_GRACE_SECS),
            readiness_timeout: None,
        }
    }
}

impl From<&SupervisorSettings> for SupervisorOptions {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            startup_delay: settings.startup_delay(),
            drain_timeout: settings.drain_timeout(),
            restart_grace: settings.restart_grace(),
            readiness_timeout: settings.readiness_timeout(),
        }
    }
}

/// Caller-side view of one running instance.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    pub tenant_id: TenantId,
    pub instance_id: u64,
    pub port: u16,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    state: watch::Receiver<ProcessState>,
}

impl InstanceHandle {
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            tenant_id: self.tenant_id,
            instance_id: self.instance_id,
            port: self.port,
            pid: self.pid,
            started_at: self.started_at,
            state: self.state(),
        }
    }

    /// Resolve once the process has really exited.
    pub async fn wait_for_exit(&mut self) -> ProcessState {
        let result = self.state.wait_for(|s| s.is_terminal()).await.map(|state| *state);
        match result {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }
}

enum Slot {
    /// Claimed by a start whose spawn is in flight.
    Launching(u64),
    Live {
        handle: InstanceHandle,
        stop_tx: oneshot::Sender<()>,
    },
}

impl Slot {
    fn instance_id(&self) -> u64 {
        match self {
            Slot::Launching(id) => *id,
            Slot::Live { handle, .. } => handle.instance_id,
        }
    }

    fn handle(&self) -> Option<&InstanceHandle> {
        match self {
            Slot::Launching(_) => None,
            Slot::Live { handle, .. } => Some(handle),
        }
    }
}

pub struct InstanceRegistry {
    launcher: Arc<dyn Launcher>,
    options: SupervisorOptions,
    table: Arc<DashMap<TenantId, Slot>>,
    exits: Arc<DashMap<TenantId, ExitRecord>>,
    next_instance: AtomicU64,
}

impl InstanceRegistry {
    pub fn new(launcher: Arc<dyn Launcher>, options: SupervisorOptions) -> Self {
        Self {
            launcher,
            options,
            table: Arc::new(DashMap::new()),
            exits: Arc::new(DashMap::new()),
            next_instance: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Launch an instance for `tenant`, or return the one already running.
    pub fn start_tenant(&self, tenant: &TenantContext) -> Result<InstanceHandle, SupervisorError> {
        let instance_id = match self.table.entry(tenant.tenant_id) {
            Entry::Occupied(existing) => {
                return match existing.get().handle() {
                    Some(handle) => {
                        debug!("{} already running, reusing handle", tenant.log_tag());
                        Ok(handle.clone())
                    }
                    None => Err(SupervisorError::Launching(tenant.log_tag())),
                };
            }
            Entry::Vacant(vacant) => {
                let instance_id = self.next_instance.fetch_add(1, Ordering::SeqCst);
                vacant.insert(Slot::Launching(instance_id));
                instance_id
            }
        };

        let process = match self.launcher.launch(tenant) {
            Ok(process) => process,
            Err(e) => {
                self.table
                    .remove_if(&tenant.tenant_id, |_, slot| slot.instance_id() == instance_id);
                return Err(e);
            }
        };

        let initial = match self.options.readiness_timeout {
            Some(_) => ProcessState::Starting,
            None => ProcessState::Running,
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = InstanceHandle {
            tenant_id: tenant.tenant_id,
            instance_id,
            port: tenant.port,
            pid: process.pid(),
            started_at: Utc::now(),
            state: state_rx,
        };

        let watcher = Watcher {
            tag: tenant.log_tag(),
            tenant_id: tenant.tenant_id,
            instance_id,
            port: tenant.port,
            options: self.options,
            table: Arc::clone(&self.table),
            exits: Arc::clone(&self.exits),
            state: state_tx,
        };
        tokio::spawn(watcher.run(process, stop_rx));

        let live = Slot::Live {
            handle: handle.clone(),
            stop_tx,
        };
        let orphan = match self.table.get_mut(&tenant.tenant_id) {
            Some(mut slot) if slot.instance_id() == instance_id => {
                *slot = live;
                None
            }
            _ => Some(live),
        };

        // Stopped while launching: the claim is gone, so stop what we spawned.
        if let Some(Slot::Live { stop_tx, .. }) = orphan {
            info!("{} instance {} stopped while launching", tenant.log_tag(), instance_id);
            let _ = stop_tx.send(());
            return Ok(handle);
        }

        info!(
            "{} instance {} started (pid={:?})",
            tenant.log_tag(),
            handle.instance_id,
            handle.pid
        );
        Ok(handle)
    }

    /// Signal the instance and drop its handle right away. The returned
    /// handle can be awaited for the real exit.
    ///
    /// A start still spawning loses its claim and stops its own process
    /// once the spawn returns; there is no handle to return for it yet.
    pub fn stop_tenant(&self, tenant_id: &TenantId) -> Option<InstanceHandle> {
        match self.table.remove(tenant_id)? {
            (_, Slot::Launching(instance_id)) => {
                info!("Cancelling launch of instance {} of {}", instance_id, tenant_id);
                None
            }
            (_, Slot::Live { handle, stop_tx }) => {
                info!("Stopping instance {} of {}", handle.instance_id, tenant_id);
                // The watcher may already be gone if the process exited meanwhile.
                let _ = stop_tx.send(());
                Some(handle)
            }
        }
    }

    /// Stop, wait up to `restart_grace` for the old process, start again.
    pub async fn restart_tenant(&self, tenant: &TenantContext) -> Result<InstanceHandle, SupervisorError> {
        if let Some(mut old) = self.stop_tenant(&tenant.tenant_id) {
            if timeout(self.options.restart_grace, old.wait_for_exit()).await.is_err() {
                warn!(
                    "{} old instance {} still running after {:?}, starting anyway",
                    tenant.log_tag(),
                    old.instance_id,
                    self.options.restart_grace
                );
            }
        }
        self.start_tenant(tenant)
    }

    /// Stop every instance and wait for them to go down.
    pub async fn shutdown_all(&self) {
        let ids: Vec<TenantId> = self.table.iter().map(|entry| *entry.key()).collect();
        let handles: Vec<InstanceHandle> = ids.iter().filter_map(|id| self.stop_tenant(id)).collect();

        if handles.is_empty() {
            return;
        }
        info!("🛑 Stopping {} tenant instance(s)", handles.len());

        let waits = handles.into_iter().map(|mut handle| async move { handle.wait_for_exit().await });
        let budget = self.options.drain_timeout + Duration::from_secs(1);
        if timeout(budget, join_all(waits)).await.is_err() {
            warn!("Some tenant instances did not report exit within {:?}", budget);
        }
    }

    pub fn handle(&self, tenant_id: &TenantId) -> Option<InstanceHandle> {
        self.table.get(tenant_id).and_then(|slot| slot.handle().cloned())
    }

    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        self.handle(tenant_id).is_some()
    }

    /// Instances with a live process; launches in flight are not counted.
    pub fn len(&self) -> usize {
        self.table.iter().filter(|slot| slot.handle().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshots(&self) -> Vec<InstanceSnapshot> {
        let mut snapshots: Vec<InstanceSnapshot> =
            self.table.iter().filter_map(|slot| slot.handle().map(InstanceHandle::snapshot)).collect();
        snapshots.sort_by_key(|s| s.port);
        snapshots
    }

    pub fn exit_record(&self, tenant_id: &TenantId) -> Option<ExitRecord> {
        self.exits.get(tenant_id).map(|record| record.clone())
    }
}

#[async_trait]
impl InstanceControl for InstanceRegistry {
    fn start(&self, restaurant: &Restaurant) -> Result<InstanceSnapshot, DomainError> {
        let tenant = restaurant
            .context()
            .ok_or(SupervisorError::NoPort(restaurant.id))?;
        Ok(self.start_tenant(&tenant)?.snapshot())
    }

    fn stop(&self, tenant_id: &TenantId) -> bool {
        self.stop_tenant(tenant_id).is_some()
    }

    async fn restart(&self, restaurant: &Restaurant) -> Result<InstanceSnapshot, DomainError> {
        let tenant = restaurant
            .context()
            .ok_or(SupervisorError::NoPort(restaurant.id))?;
        Ok(self.restart_tenant(&tenant).await?.snapshot())
    }

    fn lookup(&self, tenant_id: &TenantId) -> Option<InstanceSnapshot> {
        self.handle(tenant_id).map(|h| h.snapshot())
    }

    fn running_count(&self) -> usize {
        self.len()
    }

    fn last_exit(&self, tenant_id: &TenantId) -> Option<ExitRecord> {
        self.exit_record(tenant_id)
    }
}

enum Wake {
    Exited(io::Result<Option<i32>>),
    StopRequested,
    Ready(bool),
}

/// Owns one process until it exits.
struct Watcher {
    tag: String,
    tenant_id: TenantId,
    instance_id: u64,
    port: u16,
    options: SupervisorOptions,
    table: Arc<DashMap<TenantId, Slot>>,
    exits: Arc<DashMap<TenantId, ExitRecord>>,
    state: watch::Sender<ProcessState>,
}

impl Watcher {
    async fn run(self, mut process: Box<dyn ProcessHandle>, mut stop_rx: oneshot::Receiver<()>) {
        let mut probe = self
            .options
            .readiness_timeout
            .map(|limit| Box::pin(wait_until_ready(self.port, limit)));

        let mut requested = false;
        let status = loop {
            let wake = tokio::select! {
                status = process.wait() => Wake::Exited(status),
                // A dropped sender means the registry is gone; treat as stop.
                _ = &mut stop_rx, if !requested => Wake::StopRequested,
                ready = async {
                    match probe.as_mut() {
                        Some(p) => p.await,
                        None => std::future::pending().await,
                    }
                } => Wake::Ready(ready),
            };

            match wake {
                Wake::Exited(status) => break status,
                Wake::StopRequested => {
                    requested = true;
                    self.state.send_replace(ProcessState::Stopping);
                    if let Err(e) = process.terminate() {
                        warn!("{} failed to signal process: {}", self.tag, e);
                    }
                    break self.drain(process.as_mut()).await;
                }
                Wake::Ready(false) => {
                    probe = None;
                    warn!(
                        "{} not accepting connections on port {} after {:?}; left as starting",
                        self.tag,
                        self.port,
                        self.options.readiness_timeout.unwrap_or_default()
                    );
                }
                Wake::Ready(true) => {
                    probe = None;
                    info!("{} accepting connections on port {}", self.tag, self.port);
                    self.state.send_if_modified(|state| {
                        if *state == ProcessState::Starting {
                            *state = ProcessState::Running;
                            true
                        } else {
                            false
                        }
                    });
                }
            }
        };

        let code = match status {
            Ok(code) => code,
            Err(e) => {
                error!("{} failed waiting for process: {}", self.tag, e);
                None
            }
        };

        let final_state = if requested {
            info!("{} instance {} stopped (code={:?})", self.tag, self.instance_id, code);
            ProcessState::Stopped
        } else {
            error!(
                "{} instance {} exited unexpectedly (code={:?}); not restarting",
                self.tag, self.instance_id, code
            );
            ProcessState::Crashed
        };

        // A newer instance may already own the slot after a restart.
        let instance_id = self.instance_id;
        self.table
            .remove_if(&self.tenant_id, |_, slot| slot.instance_id() == instance_id);

        self.exits.insert(
            self.tenant_id,
            ExitRecord {
                tenant_id: self.tenant_id,
                instance_id,
                code,
                state: final_state,
                at: Utc::now(),
            },
        );

        self.state.send_replace(final_state);
    }

    /// Wait out the drain timeout, then kill.
    async fn drain(&self, process: &mut dyn ProcessHandle) -> io::Result<Option<i32>> {
        match timeout(self.options.drain_timeout, process.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}, killing",
                    self.tag, self.options.drain_timeout
                );
                if let Err(e) = process.kill() {
                    error!("{} failed to kill process: {}", self.tag, e);
                }
                process.wait().await
            }
        }
    }
}

/// Poll a TCP connect to the tenant port until it succeeds or `limit`
/// elapses.
async fn wait_until_ready(port: u16, limit: Duration) -> bool {
    let attempt = async {
        loop {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            sleep(READINESS_POLL).await;
        }
    };
    timeout(limit, attempt).await.is_ok()
}
