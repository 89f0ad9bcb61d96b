//! # PipeHandle: ownership of one worker process's standard streams.
//!
//! A [`PipeHandle`] owns the OS-level resources of exactly one worker:
//! piped stdin, the process handle, and background readers for stdout and
//! stderr. It offers the narrow contract the session layer needs:
//!
//! - [`write`](PipeHandle::write) — bounded-time write to worker stdin,
//!   rejected immediately when the input is no longer accepting bytes
//! - [`close_input`](PipeHandle::close_input) — graceful stop request
//!   (EOF on the worker's stdin)
//! - [`terminate`](PipeHandle::terminate) — idempotent forced kill
//! - [`wait`](PipeHandle::wait) — resolves with the terminal
//!   [`WorkerExit`], whether the exit was requested or not
//!
//! ## Diagnostic streams
//! Worker stderr lines are classified advisory-only, matching the encoder's
//! conventions: lines containing `error`/`Error` log at `warn`, progress
//! lines (`frame=`, `time=`) at `debug`, anything else is discarded.
//! Classification never affects control flow. Stdout is drained at `debug`
//! so a chatty worker can never block on a full pipe.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time;
use tracing::{debug, warn};

use crate::error::RelayError;

use super::invocation::Invocation;

/// Why a write to the worker's input was rejected. The chunk is gone either
/// way; callers decide whether to surface it as backpressure or a dead input.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Input stream is closed (input closed earlier, worker exited, or a
    /// previous write left the stream in an unknown state).
    #[error("worker input is closed")]
    Closed,

    /// The write did not complete within the bound. The input is closed
    /// afterwards: an interrupted `write_all` may have written a partial
    /// chunk, and resuming mid-frame would corrupt the stream.
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    /// Other I/O failure on the input stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Terminal exit observation for one worker process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, when killed (unix only).
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// True when the worker exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Handle to one running worker process.
#[derive(Debug)]
pub struct PipeHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    client: Arc<str>,
    pid: Option<u32>,
    kill_sent: bool,
}

impl PipeHandle {
    /// Spawns the worker described by `invocation` with all three standard
    /// streams piped, and starts the diagnostic readers.
    ///
    /// `client` is used only for log correlation.
    pub fn spawn(invocation: &Invocation, client: impl Into<Arc<str>>) -> Result<Self, RelayError> {
        let client: Arc<str> = client.into();

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.argv())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // last-resort reclamation; the session actor normally awaits wait()
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RelayError::Spawn { source })?;
        let pid = child.id();

        let stdin = child.stdin.take();
        if let Some(stdout) = child.stdout.take() {
            spawn_stdout_reader(Arc::clone(&client), stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_reader(Arc::clone(&client), stderr);
        }

        debug!(client = &*client, pid, "worker spawned");

        Ok(Self {
            child,
            stdin,
            client,
            pid,
            kill_sent: false,
        })
    }

    /// OS process id, when still known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True while the input stream is accepting writes.
    pub fn is_writable(&self) -> bool {
        self.stdin.is_some()
    }

    /// Writes `bytes` to the worker's input, bounded by `limit`.
    ///
    /// Rejected immediately with [`WriteError::Closed`] when the input is
    /// not currently accepting writes; callers must not assume a queued
    /// write would eventually succeed. A timed-out or broken-pipe write
    /// closes the input (partial-write protection).
    pub async fn write(&mut self, bytes: &[u8], limit: Duration) -> Result<(), WriteError> {
        let stdin = self.stdin.as_mut().ok_or(WriteError::Closed)?;

        match time::timeout(limit, stdin.write_all(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                self.stdin = None;
                Err(WriteError::Closed)
            }
            Ok(Err(e)) => Err(WriteError::Io(e)),
            Err(_elapsed) => {
                self.stdin = None;
                Err(WriteError::TimedOut(limit))
            }
        }
    }

    /// Closes the worker's input stream (EOF), asking it to finish and exit
    /// on its own. No-op if the input is already closed.
    pub fn close_input(&mut self) {
        if self.stdin.take().is_some() {
            debug!(client = &*self.client, "worker input closed");
        }
    }

    /// Sends the termination signal to the worker.
    ///
    /// Idempotent: calling it again, or calling it on an already-exited
    /// worker, is a no-op rather than an error.
    pub fn terminate(&mut self) {
        if self.kill_sent {
            return;
        }
        self.kill_sent = true;
        if let Err(e) = self.child.start_kill() {
            // already exited; wait() still yields the status
            debug!(client = &*self.client, error = %e, "terminate after exit ignored");
        }
    }

    /// Waits for the process to end and returns its terminal status.
    ///
    /// Cancel safe; may be polled inside `select!` loops. The process is
    /// reaped here — callers must reach this (the session actor always
    /// does) so no zombie handle is leaked.
    pub async fn wait(&mut self) -> WorkerExit {
        match self.child.wait().await {
            Ok(status) => WorkerExit::from(status),
            Err(e) => {
                warn!(client = &*self.client, error = %e, "wait on worker failed");
                WorkerExit {
                    code: None,
                    signal: None,
                }
            }
        }
    }
}

/// Drains worker stdout at `debug`; the encoder rarely writes here but a
/// full pipe would stall it.
fn spawn_stdout_reader(client: Arc<str>, stdout: ChildStdout) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(client = &*client, line, "worker stdout");
        }
    });
}

/// Classifies worker stderr lines: error markers at `warn`, progress
/// markers at `debug`, everything else dropped. Advisory only.
fn spawn_stderr_reader(client: Arc<str>, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains("error") || line.contains("Error") {
                warn!(client = &*client, line, "worker stderr");
            } else if line.contains("frame=") || line.contains("time=") {
                debug!(client = &*client, line, "worker progress");
            }
        }
    });
}
