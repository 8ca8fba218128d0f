//! Server process lifecycle (C3)
//!
//! Spawns a language server as a child process and wires its stdio into the
//! JSON-RPC `Engine`. The launch command is always argv-style (program +
//! argument vector) — never a shell string that needs quoting/splitting —
//! per the REDESIGN FLAG on `Profile::launch_command`.

use langbridge_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use langbridge_core::constants::STDERR_RING_CAPACITY;

/// A bounded ring buffer of the server's most recent stderr lines, kept so
/// a crash report can include recent diagnostic output without unbounded
/// memory growth over a long-lived connection.
#[derive(Clone, Default)]
pub struct StderrRing {
  lines: Arc<Mutex<VecDeque<String>>>,
}

impl StderrRing {
  fn push(&self, line: String) {
    let mut lines = self.lines.lock();
    if lines.len() == STDERR_RING_CAPACITY {
      lines.pop_front();
    }
    lines.push_back(line);
  }

  /// A snapshot of the captured lines, oldest first.
  pub fn snapshot(&self) -> Vec<String> {
    self.lines.lock().iter().cloned().collect()
  }
}

/// The stdio handles an `Engine` needs, returned separately from the
/// `ProcessHandle` so the two can be moved into different owners (the
/// engine's reader/writer tasks vs. the connection's supervising task)
/// without any unsafe placeholder juggling.
pub struct ServerStdio {
  pub stdin: tokio::process::ChildStdin,
  pub stdout: BufReader<tokio::process::ChildStdout>,
}

/// A spawned language server child process, with stdio already split off.
/// Keeps only what's needed to monitor and tear the process down.
pub struct ProcessHandle {
  child: Child,
  pub stderr_ring: StderrRing,
}

impl ProcessHandle {
  /// Spawn `program` with `args` (argv-style; no shell involved), piping
  /// stdin/stdout/stderr. `cwd`, if set, becomes the child's working
  /// directory — most servers also want the workspace root passed via
  /// `initialize`, but some also respect cwd for locating a project file.
  /// Returns the process handle and its stdio separately.
  pub fn spawn(
    program: &str,
    args: &[String],
    cwd: Option<&std::path::Path>,
  ) -> Result<(Self, ServerStdio)> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
      command.current_dir(cwd);
    }
    command.stdin(Stdio::piped());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| Error::ServerStartupFailed {
      reason: format!("failed to spawn `{program}`: {e}"),
    })?;

    let stdin = child.stdin.take().ok_or_else(|| Error::ServerStartupFailed {
      reason: "child process has no stdin handle".to_string(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| Error::ServerStartupFailed {
      reason: "child process has no stdout handle".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| Error::ServerStartupFailed {
      reason: "child process has no stderr handle".to_string(),
    })?;

    let stderr_ring = StderrRing::default();
    tokio::spawn(Self::drain_stderr(stderr, stderr_ring.clone(), program.to_string()));

    info!(program, ?args, pid = child.id(), "spawned language server process");

    Ok((
      Self { child, stderr_ring },
      ServerStdio { stdin, stdout: BufReader::new(stdout) },
    ))
  }

  async fn drain_stderr(
    stderr: tokio::process::ChildStderr,
    ring: StderrRing,
    program: String,
  ) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
      match lines.next_line().await {
        Ok(Some(line)) => {
          warn!(target: "langbridge::server_stderr", server = %program, "{line}");
          ring.push(line);
        },
        Ok(None) => break,
        Err(e) => {
          warn!(server = %program, error = %e, "stderr stream error, stopping capture");
          break;
        },
      }
    }
  }

  /// The OS process id, if the child is still tracked.
  pub fn pid(&self) -> Option<u32> {
    self.child.id()
  }

  /// Poll whether the child has already exited, without blocking.
  pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
    self.child.try_wait().map_err(Error::Io)
  }

  /// Ask the process to exit, waiting up to a grace period before killing.
  pub async fn kill(&mut self) -> Result<()> {
    self.child.start_kill().map_err(Error::Io)?;
    let _ = self.child.wait().await;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn spawns_and_captures_stderr() {
    let (mut handle, _stdio) = ProcessHandle::spawn(
      "sh",
      &["-c".to_string(), "echo oops 1>&2; sleep 5".to_string()],
      None,
    )
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(handle.stderr_ring.snapshot(), vec!["oops".to_string()]);
    assert!(handle.try_wait().unwrap().is_none());

    handle.kill().await.unwrap();
  }

  #[tokio::test]
  async fn missing_binary_is_startup_failure() {
    let result = ProcessHandle::spawn("definitely-not-a-real-binary-xyz", &[], None);
    assert!(matches!(result, Err(Error::ServerStartupFailed { .. })));
  }
}
