// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The runner talks to a `ProcessManager` instead of a raw
//! `tokio::process::Child`. This makes it easy to swap in a scripted fake
//! process in tests while keeping the production implementation here.
//!
//! - `TokioProcessManager` is the default implementation. It spawns the child
//!   with piped stdout/stderr and one reader task per stream, both feeding a
//!   single bounded channel of [`Output`] lines. A full channel stalls the
//!   readers, which in turn stalls the child on its pipe.
//! - [`wait_for_exit`] and [`wait_for_exit_async`] implement the two waiting
//!   contracts (bounded by a timeout, or cancellable by a token) on top of any
//!   backend.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::exec::launch::{LaunchSpec, Output};
use crate::types::Stream;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lines buffered between the reader tasks and the runner.
pub const OUTPUT_BUFFER: usize = 1024;

/// Trait abstracting one child process.
///
/// An instance manages exactly one process and is never shared between runs.
pub trait ProcessManager: Send {
    /// Start the process described by `spec`.
    fn start(&mut self, spec: Arc<LaunchSpec>) -> io::Result<()>;

    /// Hand over the stream of output lines. Returns `None` after the first call.
    fn take_output(&mut self) -> Option<mpsc::Receiver<Output>>;

    /// Wait until the process exits and return its exit code (if any).
    ///
    /// Must be cancel-safe: dropping the future leaves the process running
    /// and a later call resumes waiting.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>>;

    /// Request termination.
    ///
    /// Returns `true` only when a kill signal was actually sent. Killing a
    /// process that already exited, or killing twice, returns `false` and
    /// never fails.
    fn kill(&mut self) -> bool;

    fn id(&self) -> Option<u32>;

    fn exit_code(&self) -> Option<i32>;
}

/// Why an asynchronous wait ended without an exit code.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("wait cancelled")]
    Cancelled,

    #[error("wait failed: {0}")]
    Io(#[from] io::Error),
}

/// Wait for the process to exit for at most `timeout`.
///
/// Returns `Ok(true)` if the process exited, `Ok(false)` if the timeout elapsed
/// first. A zero timeout waits indefinitely. The process is **not** killed
/// here; that is the caller's decision.
pub async fn wait_for_exit<M>(manager: &mut M, timeout: Duration) -> io::Result<bool>
where
    M: ProcessManager + ?Sized,
{
    if timeout.is_zero() {
        manager.wait().await?;
        return Ok(true);
    }

    match tokio::time::timeout(timeout, manager.wait()).await {
        Ok(res) => res.map(|_| true),
        Err(_elapsed) => Ok(false),
    }
}

/// Wait for the process to exit, giving up as soon as `cancel` fires.
pub async fn wait_for_exit_async<M>(
    manager: &mut M,
    cancel: &CancellationToken,
) -> Result<Option<i32>, WaitError>
where
    M: ProcessManager + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WaitError::Cancelled),
        res = manager.wait() => res.map_err(WaitError::Io),
    }
}

/// Real process backend on top of `tokio::process`.
#[derive(Debug, Default)]
pub struct TokioProcessManager {
    child: Option<Child>,
    output: Option<mpsc::Receiver<Output>>,
    readers: Vec<JoinHandle<()>>,
    pid: Option<u32>,
    exit_code: Option<i32>,
    exited: bool,
    killed: bool,
}

impl TokioProcessManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessManager for TokioProcessManager {
    fn start(&mut self, spec: Arc<LaunchSpec>) -> io::Result<()> {
        if self.child.is_some() {
            return Err(io::Error::other("process already started"));
        }

        let mut cmd = Command::new(&spec.executable);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id().unwrap_or_default();

        debug!(
            name = %spec.short_name,
            pid,
            cmd = %spec.command_line(),
            "started process"
        );

        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            self.readers.push(spawn_reader(
                stdout,
                Stream::StdOut,
                Arc::clone(&spec),
                pid,
                tx.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            self.readers
                .push(spawn_reader(stderr, Stream::StdErr, spec, pid, tx));
        }

        self.output = Some(rx);
        self.pid = Some(pid);
        self.child = Some(child);
        Ok(())
    }

    fn take_output(&mut self) -> Option<mpsc::Receiver<Output>> {
        self.output.take()
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            let child = self
                .child
                .as_mut()
                .ok_or_else(|| io::Error::other("process was not started"))?;
            let status = child.wait().await?;
            self.exited = true;
            self.exit_code = status.code();
            Ok(status.code())
        })
    }

    fn kill(&mut self) -> bool {
        if self.killed || self.exited {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                self.exited = true;
                self.exit_code = status.code();
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(pid = ?self.pid, error = %e, "try_wait failed before kill");
            }
        }

        match child.start_kill() {
            Ok(()) => {
                self.killed = true;
                debug!(pid = ?self.pid, "kill signal sent");
                true
            }
            Err(e) => {
                // Typically the process is already gone.
                warn!(pid = ?self.pid, error = %e, "failed to kill process");
                false
            }
        }
    }

    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

impl Drop for TokioProcessManager {
    fn drop(&mut self) {
        // Grandchildren may keep the pipes open after the child is gone.
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

/// Read `reader` line by line and forward each line to `tx`.
///
/// Invalid UTF-8 is replaced rather than ending the stream, and trailing
/// `\r\n` / `\n` are stripped.
fn spawn_reader<R>(
    reader: R,
    stream: Stream,
    spec: Arc<LaunchSpec>,
    pid: u32,
    tx: mpsc::Sender<Output>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    trace!(pid, %stream, "{}", line);
                    if tx
                        .send(Output::new(Arc::clone(&spec), stream, line, pid))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    debug!(pid, %stream, error = %e, "output reader failed");
                    break;
                }
            }
        }

        debug!(pid, %stream, "output reader finished");
    })
}
