//! In-process fake launcher for supervisor and API tests.
//!
//! Fake processes never touch the operating system. Each one exits when it
//! is terminated or killed, or when a test injects a crash with
//! [`FakeLauncher::crash`].

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use comanda_shared::TenantContext;

use crate::error::SupervisorError;
use crate::launcher::{Launcher, ProcessHandle};

#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub tenant: TenantContext,
    pub pid: u32,
}

/// Rendezvous for a launch held open by [`FakeLauncher::hold_next_launch`].
/// The launch waits on `entered` once it has begun and on `release` before
/// it returns; the test takes the other side of both.
pub struct LaunchGate {
    pub entered: Barrier,
    pub release: Barrier,
}

#[derive(Default)]
struct Shared {
    exits: Mutex<HashMap<u32, mpsc::UnboundedSender<Option<i32>>>>,
    alive: Mutex<HashSet<u32>>,
    terminated: Mutex<Vec<u32>>,
}

pub struct FakeLauncher {
    shared: Arc<Shared>,
    launches: Mutex<Vec<LaunchRecord>>,
    next_pid: AtomicU32,
    fail_next: AtomicBool,
    ignore_sigterm: AtomicBool,
    gate: Mutex<Option<Arc<LaunchGate>>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            launches: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(4000),
            fail_next: AtomicBool::new(false),
            ignore_sigterm: AtomicBool::new(false),
            gate: Mutex::new(None),
        }
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next launch fail as if the binary were missing.
    pub fn fail_next_launch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Block the next launch inside the spawn until the test releases it.
    pub fn hold_next_launch(&self) -> Arc<LaunchGate> {
        let gate = Arc::new(LaunchGate {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Processes launched from now on ignore SIGTERM and only die on kill.
    pub fn ignore_sigterm(&self, ignore: bool) {
        self.ignore_sigterm.store(ignore, Ordering::SeqCst);
    }

    /// Make the process exit with `code` without anyone asking.
    pub fn crash(&self, pid: u32, code: i32) -> bool {
        match self.shared.exits.lock().get(&pid) {
            Some(tx) => tx.send(Some(code)).is_ok(),
            None => false,
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.shared.alive.lock().contains(&pid)
    }

    pub fn alive_count(&self) -> usize {
        self.shared.alive.lock().len()
    }

    /// Pids that received a termination signal, in order.
    pub fn terminated(&self) -> Vec<u32> {
        self.shared.terminated.lock().clone()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, tenant: &TenantContext) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.wait();
            gate.release.wait();
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SupervisorError::Spawn {
                tenant: tenant.log_tag(),
                source: io::Error::new(io::ErrorKind::NotFound, "tenant binary not found"),
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        self.shared.exits.lock().insert(pid, tx.clone());
        self.shared.alive.lock().insert(pid);
        self.launches.lock().push(LaunchRecord {
            tenant: tenant.clone(),
            pid,
        });

        Ok(Box::new(FakeProcess {
            pid,
            tx,
            rx,
            ignore_sigterm: self.ignore_sigterm.load(Ordering::SeqCst),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    tx: mpsc::UnboundedSender<Option<i32>>,
    rx: mpsc::UnboundedReceiver<Option<i32>>,
    ignore_sigterm: bool,
    shared: Arc<Shared>,
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.shared.terminated.lock().push(self.pid);
        if !self.ignore_sigterm {
            let _ = self.tx.send(Some(0));
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        let _ = self.tx.send(None);
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let code = self.rx.recv().await.flatten();
        self.shared.alive.lock().remove(&self.pid);
        self.shared.exits.lock().remove(&self.pid);
        Ok(code)
    }
}
