use std::time::Duration;

use command_group::{AsyncCommandGroup, AsyncGroupChild};
use thiserror::Error;
use tokio::sync::Mutex;

const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to signal child process: {0}")]
    Signal(#[source] std::io::Error),
    #[error("failed to wait on child process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Outcome of a child run, surfaced to the reload controller so it can
/// decide (per `--supervise`) whether to shut down or await the next
/// restart trigger (spec §4.6 / §7 `ChildExitUnclean`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub code: Option<i32>,
}

/// Spawns the user's command into its own process group (so a hard-kill
/// reaches grandchildren a Node script may itself have spawned), and
/// signals/respawns it on request.
///
/// Built on `command_group`'s `AsyncGroupChild`, the same type the teacher's
/// `daemon::connector::start_daemon` gets from `Command::group_spawn`.
pub struct Supervisor {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    child: Mutex<Option<AsyncGroupChild>>,
}

impl Supervisor {
    pub fn new(argv: Vec<String>, env: Vec<(String, String)>) -> Self {
        let mut iter = argv.into_iter();
        let program = iter.next().unwrap_or_default();
        Self {
            program,
            args: iter.collect(),
            env,
            child: Mutex::new(None),
        }
    }

    fn build_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }

    async fn spawn(&self) -> Result<(), SupervisorError> {
        let child = self
            .build_command()
            .group_spawn()
            .map_err(SupervisorError::Spawn)?;
        *self.child.lock().await = Some(child);
        Ok(())
    }

    /// Hard-kills any live child immediately, then spawns a fresh one.
    /// Per spec.md §9 Open Questions, restart intentionally skips the
    /// graceful-then-escalate sequence `stop()` uses, favoring
    /// responsiveness over letting buffered child output flush.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        self.kill().await?;
        self.spawn().await
    }

    /// Sends a graceful terminate signal, then escalates to a hard kill if
    /// the child hasn't exited within 5 seconds.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.terminate().await?;
        let exited = tokio::time::timeout(GRACEFUL_STOP_TIMEOUT, self.wait()).await;
        if exited.is_err() {
            tracing::warn!("child did not exit within {:?}, killing", GRACEFUL_STOP_TIMEOUT);
            self.kill().await?;
        }
        Ok(())
    }

    /// Hard-kills the whole process group immediately, if a child is live.
    pub async fn kill(&self) -> Result<(), SupervisorError> {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            child.kill().map_err(SupervisorError::Signal)?;
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn terminate(&self) -> Result<(), SupervisorError> {
        let guard = self.child.lock().await;
        let Some(child) = guard.as_ref() else {
            return Ok(());
        };
        // group_spawn places the child in its own process group with pgid
        // == pid; a negative pid targets the whole group.
        let pgid = child.id().ok_or_else(|| {
            SupervisorError::Signal(std::io::Error::new(
                std::io::ErrorKind::Other,
                "child has no pid",
            ))
        })?;
        let result = unsafe { libc::kill(-(pgid as i32), libc::SIGTERM) };
        if result != 0 {
            return Err(SupervisorError::Signal(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(windows)]
    async fn terminate(&self) -> Result<(), SupervisorError> {
        // No portable CTRL_BREAK_EVENT delivery to an arbitrary process
        // group without extra Win32 bindings; fall back to an immediate
        // hard kill rather than hand-roll an untested syscall path.
        self.kill().await
    }

    /// Waits for the live child to exit, if any. Clears the child slot on
    /// exit so a subsequent `wait()`/`is_running()` reflects that nothing is
    /// live, rather than re-waiting on an already-reaped child.
    pub async fn wait(&self) -> Result<Option<ChildExit>, SupervisorError> {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return Ok(None);
        };
        let status = child.wait().await.map_err(SupervisorError::Wait)?;
        *guard = None;
        Ok(Some(ChildExit {
            code: status.code(),
        }))
    }

    pub async fn is_running(&self) -> bool {
        self.child.lock().await.is_some()
    }
}
