//! Ephemeral views of running tenant instances.

use chrono::{DateTime, Utc};
use serde::Serialize;

use comanda_shared::TenantId;

/// Lifecycle of one spawned tenant process.
///
/// `Starting -> Running -> Stopping -> Stopped` for a requested stop,
/// `Starting | Running -> Crashed` for an exit nobody asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Crashed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
            ProcessState::Crashed => "crashed",
        }
    }
}

/// Point-in-time copy of an instance table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSnapshot {
    pub tenant_id: TenantId,
    pub instance_id: u64,
    pub port: u16,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub state: ProcessState,
}

/// Last observed exit of a tenant process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitRecord {
    pub tenant_id: TenantId,
    pub instance_id: u64,
    pub code: Option<i32>,
    pub state: ProcessState,
    pub at: DateTime<Utc>,
}
