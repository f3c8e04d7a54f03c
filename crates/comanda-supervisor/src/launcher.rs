//! Process launching.
//!
//! [`Launcher`] is the seam between the instance table and the operating
//! system. Production uses [`CommandLauncher`]; tests plug in the
//! `FakeLauncher` from the `testing` feature.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use comanda_shared::TenantContext;

use crate::error::SupervisorError;

/// A spawned tenant process as seen by its watcher.
#[async_trait]
pub trait ProcessHandle: Send + 'static {
    fn pid(&self) -> Option<u32>;

    /// Ask the process to shut down (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process down.
    fn kill(&mut self) -> io::Result<()>;

    /// Wait for exit. `Ok(None)` means the process was ended by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

pub trait Launcher: Send + Sync + 'static {
    /// Spawn the tenant process for `tenant`. Must not block on the child.
    fn launch(&self, tenant: &TenantContext) -> Result<Box<dyn ProcessHandle>, SupervisorError>;
}

/// Spawns the configured tenant-server executable.
///
/// The child inherits the parent environment, so database and JWT settings
/// flow through, plus the `TENANT_*` identity variables.
pub struct CommandLauncher {
    binary: PathBuf,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, tenant: &TenantContext) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let tag = tenant.log_tag();

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .envs(tenant.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            tenant: tag.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tag.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tag.clone(), true));
        }

        info!("{} spawned {} (pid={:?})", tag, self.binary.display(), child.id());
        Ok(Box::new(ChildProcess { child }))
    }
}

async fn forward_lines<R>(reader: R, tag: String, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!("{} {}", tag, line);
        } else {
            info!("{} {}", tag, line);
        }
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Already reaped.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}
