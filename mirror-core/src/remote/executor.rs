//! Remote command execution.
//!
//! [`RemoteExecutor`] is the seam between the session and the device
//! bridge. [`AdbExecutor`] drives the `adb` binary; tests plug in their
//! own implementation.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

// ── CommandOutput ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub status: Option<i32>,
    /// Standard output followed by standard error.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

// ── Traits ───────────────────────────────────────────────────────

/// Runs commands against a named remote target.
///
/// An empty `serial` targets the only attached device.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command to completion with a bounded wait.
    async fn run(&self, serial: &str, args: &[String]) -> io::Result<CommandOutput>;

    /// Start a long-lived command and return without waiting for it.
    async fn spawn(&self, serial: &str, args: &[String]) -> io::Result<Box<dyn RemoteProcess>>;
}

/// A process started by [`RemoteExecutor::spawn`].
#[async_trait]
pub trait RemoteProcess: Send {
    /// Whether the process is still running.
    fn is_running(&mut self) -> bool;

    /// Kill the process and wait up to `timeout` for it to exit.
    async fn terminate(&mut self, timeout: Duration);
}

// ── AdbExecutor ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AdbExecutor {
    program: PathBuf,
    timeout: Duration,
}

impl AdbExecutor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, serial: &str, args: &[String]) -> Command {
        let full = target_args(serial, args);
        debug!(program = %self.program.display(), args = ?full, "adb");
        let mut cmd = Command::new(&self.program);
        cmd.args(full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for AdbExecutor {
    fn default() -> Self {
        Self::new("adb", Duration::from_secs(10))
    }
}

/// `-s <serial>` followed by `args`, or just `args` for an empty serial.
pub fn target_args(serial: &str, args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + 2);
    if !serial.is_empty() {
        out.push("-s".to_owned());
        out.push(serial.to_owned());
    }
    out.extend_from_slice(args);
    out
}

#[async_trait]
impl RemoteExecutor for AdbExecutor {
    async fn run(&self, serial: &str, args: &[String]) -> io::Result<CommandOutput> {
        let child = self.command(serial, args).spawn()?;
        let out = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("adb did not finish within {:?}", self.timeout),
                )
            })??;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(CommandOutput {
            status: out.status.code(),
            output,
        })
    }

    async fn spawn(&self, serial: &str, args: &[String]) -> io::Result<Box<dyn RemoteProcess>> {
        let mut child = self.command(serial, args).spawn()?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr));
        }
        Ok(Box::new(AdbProcess { child }))
    }
}

/// Relay the remote server's console into the log.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "mirror::server", "{line}");
    }
}

struct AdbProcess {
    child: Child,
}

#[async_trait]
impl RemoteProcess for AdbProcess {
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self, timeout: Duration) {
        if !self.is_running() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!("failed to signal server process: {e}");
            return;
        }
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "server process exited"),
            Ok(Err(e)) => warn!("waiting for server process failed: {e}"),
            Err(_) => warn!(?timeout, "server process did not exit in time"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn serial_is_prepended() {
        assert_eq!(
            target_args("emulator-5554", &args(&["forward", "--list"])),
            args(&["-s", "emulator-5554", "forward", "--list"])
        );
    }

    #[test]
    fn empty_serial_is_omitted() {
        assert_eq!(target_args("", &args(&["devices"])), args(&["devices"]));
    }

    #[test]
    fn success_requires_zero_status() {
        let ok = CommandOutput {
            status: Some(0),
            output: String::new(),
        };
        let killed = CommandOutput {
            status: None,
            output: String::new(),
        };
        assert!(ok.success());
        assert!(!killed.success());
    }

    #[tokio::test]
    async fn missing_program_is_launch_error() {
        let exec = AdbExecutor::new("/nonexistent/adb-binary", Duration::from_secs(1));
        let err = exec.run("", &args(&["devices"])).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
