//! Handle to one external pipeline process.

use std::process::{Child, ChildStdout, Command, ExitStatus};

use streamgate_common::{Error, Result};

/// A spawned external process with a display name for logging.
#[derive(Debug)]
pub struct ChildProcess {
    name: String,
    child: Child,
}

impl ChildProcess {
    /// Spawn `command`, reporting OS failures as [`Error::Spawn`].
    pub fn spawn(name: impl Into<String>, command: &mut Command) -> Result<Self> {
        let name = name.into();
        let child = command.spawn().map_err(|e| Error::spawn(&name, e))?;

        tracing::debug!(process = %name, pid = child.id(), "Spawned process");

        Ok(Self { name, child })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking liveness poll. Reaps the process if it has exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::trace!(process = %self.name, pid = self.pid(), %status, "Process has exited");
                false
            }
            Err(e) => {
                tracing::warn!(process = %self.name, pid = self.pid(), "Failed to poll process: {}", e);
                false
            }
        }
    }

    /// Take the read end of the process's stdout, if it was piped and not
    /// already handed to another process.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Ask the process to exit (SIGTERM).
    pub fn terminate(&mut self) -> std::io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        send_sigterm(&mut self.child)
    }

    /// Force the process to exit (SIGKILL).
    pub fn kill(&mut self) -> std::io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.child.kill()
    }

    /// Block until the process has exited and collect its status.
    pub fn reap(&mut self) -> Option<ExitStatus> {
        match self.child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(process = %self.name, pid = self.pid(), "Failed to reap process: {}", e);
                None
            }
        }
    }

    /// Kill and reap, logging rather than returning failures.
    pub fn kill_and_reap(&mut self) {
        if let Err(e) = self.kill() {
            tracing::warn!(process = %self.name, pid = self.pid(), "Failed to kill process: {}", e);
        }
        self.reap();
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)?;
    Ok(())
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}
