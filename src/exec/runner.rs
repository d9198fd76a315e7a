// src/exec/runner.rs

//! Single-run process supervisor.
//!
//! A [`ProcessRunner`] owns one [`ProcessManager`] and drives it through
//! exactly one run: start, stream output, wait (bounded by a timeout and/or a
//! cancellation token), kill if needed, and produce exactly one
//! [`ProcessResult`].

use std::fmt;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::errors::RunError;
use crate::exec::backend::{wait_for_exit_async, ProcessManager, WaitError, OUTPUT_BUFFER};
use crate::exec::launch::{LaunchSpec, Output};
use crate::stats::RunRegistry;
use crate::types::Stream;

/// How long to wait for a killed process to be reaped.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Terminal state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Finished,
    Canceled,
    FailedToStart,
}

/// The single terminal report of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub name: String,
    pub spec: Arc<LaunchSpec>,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub pid: Option<u32>,
    /// Start failure text for `FailedToStart`.
    pub error: Option<String>,
}

impl ProcessResult {
    fn new(spec: &Arc<LaunchSpec>, state: ProcessState, elapsed: Duration) -> Self {
        Self {
            name: spec.short_name.clone(),
            spec: Arc::clone(spec),
            state,
            exit_code: None,
            elapsed,
            pid: None,
            error: None,
        }
    }

    pub fn finished(
        spec: &Arc<LaunchSpec>,
        pid: Option<u32>,
        exit_code: Option<i32>,
        elapsed: Duration,
    ) -> Self {
        Self {
            exit_code,
            pid,
            ..Self::new(spec, ProcessState::Finished, elapsed)
        }
    }

    pub fn canceled(spec: &Arc<LaunchSpec>, pid: Option<u32>, elapsed: Duration) -> Self {
        Self {
            pid,
            ..Self::new(spec, ProcessState::Canceled, elapsed)
        }
    }

    pub fn failed_to_start(spec: &Arc<LaunchSpec>, error: &io::Error, elapsed: Duration) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(spec, ProcessState::FailedToStart, elapsed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == ProcessState::Finished && self.exit_code == Some(0)
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.name)?;
        if let Some(pid) = self.pid {
            write!(f, " process {pid}")?;
        }
        match self.state {
            ProcessState::Finished => match self.exit_code {
                Some(code) => write!(f, " finished with exit code {code}")?,
                None => write!(f, " finished without an exit code")?,
            },
            ProcessState::Canceled => write!(f, " was canceled")?,
            ProcessState::FailedToStart => {
                write!(f, " failed to start")?;
                if let Some(err) = &self.error {
                    write!(f, ": {err}")?;
                }
            }
        }
        write!(f, " ({:.3}s)", self.elapsed.as_secs_f64())
    }
}

/// Receives each output line before the default writer sees it.
///
/// Setting `output.handled = true` suppresses the default writer.
pub trait OutputHandler: Send {
    fn handle(&mut self, output: &mut Output);
}

impl<F> OutputHandler for F
where
    F: FnMut(&mut Output) + Send,
{
    fn handle(&mut self, output: &mut Output) {
        self(output)
    }
}

/// Default destination for lines no handler claimed.
pub trait OutputWriter: Send + Sync {
    fn write(&self, output: &Output);
}

/// Echoes unhandled lines to this process's own stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutputWriter;

impl OutputWriter for ConsoleOutputWriter {
    fn write(&self, output: &Output) {
        let res = match output.stream {
            Stream::StdOut => writeln!(io::stdout().lock(), "{}", output.line),
            Stream::StdErr => writeln!(io::stderr().lock(), "{}", output.line),
        };
        if let Err(e) = res {
            debug!(error = %e, "failed to echo process output");
        }
    }
}

/// Per-run wait bounds.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the process and report `Canceled` once this elapses. `None` or
    /// zero waits indefinitely.
    pub timeout: Option<Duration>,
    /// Caller's cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancel: Some(cancel),
        }
    }
}

/// How the wait phase ended.
enum WaitEnd {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
    Failed(io::Error),
}

/// Drives one [`ProcessManager`] through one run.
pub struct ProcessRunner<M: ProcessManager> {
    manager: M,
    writer: Arc<dyn OutputWriter>,
    registry: Option<Arc<dyn RunRegistry>>,
    drain_timeout: Duration,
}

impl<M: ProcessManager> fmt::Debug for ProcessRunner<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

impl<M: ProcessManager> ProcessRunner<M> {
    pub fn new(manager: M) -> Self {
        Self {
            manager,
            writer: Arc::new(ConsoleOutputWriter),
            registry: None,
            drain_timeout: Settings::default().drain_timeout,
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn OutputWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Run the process to a terminal state.
    ///
    /// - Start failure: `Ok` with `FailedToStart`; nothing is waited for.
    /// - Timeout: the process is killed, `Ok` with `Canceled`.
    /// - Caller cancellation: the process is killed, a `Canceled` result is
    ///   recorded and `Err(RunError::Cancelled)` is returned.
    /// - Unexpected wait failure: the process is killed, a `Canceled` result
    ///   is recorded and the failure is returned as `Err(RunError::Wait)`.
    ///
    /// Exactly one result reaches the registry in every case.
    pub async fn run(
        mut self,
        spec: LaunchSpec,
        handler: &mut dyn OutputHandler,
        options: RunOptions,
    ) -> Result<ProcessResult, RunError> {
        let spec = Arc::new(spec);
        let started_at = Instant::now();

        if let Err(err) = self.manager.start(Arc::clone(&spec)) {
            let result = ProcessResult::failed_to_start(&spec, &err, started_at.elapsed());
            warn!(name = %spec.short_name, error = %err, "process failed to start");
            self.report(&result);
            return Ok(result);
        }

        let pid = self.manager.id();
        info!(name = %spec.short_name, pid = ?pid, cmd = %spec.command_line(), "process started");

        let mut output = self.manager.take_output();
        let writer = Arc::clone(&self.writer);
        let mut deliver = |mut line: Output| {
            handler.handle(&mut line);
            if !line.handled {
                writer.write(&line);
            }
        };

        let wait = wait_end(&mut self.manager, options.timeout, options.cancel.as_ref());
        let end = pump_output(wait, output.as_mut(), &mut deliver).await;

        let exit_code = match &end {
            WaitEnd::Exited(code) => *code,
            WaitEnd::TimedOut | WaitEnd::Cancelled | WaitEnd::Failed(_) => {
                self.terminate().await;
                None
            }
        };
        let elapsed = started_at.elapsed();

        if let Some(rx) = output.as_mut() {
            drain_output(rx, self.drain_timeout, &mut deliver).await;
        }

        let result = match &end {
            WaitEnd::Exited(_) => ProcessResult::finished(&spec, pid, exit_code, elapsed),
            _ => ProcessResult::canceled(&spec, pid, elapsed),
        };
        self.report(&result);

        match end {
            WaitEnd::Exited(_) | WaitEnd::TimedOut => Ok(result),
            WaitEnd::Cancelled => Err(RunError::Cancelled(Box::new(result))),
            WaitEnd::Failed(source) => Err(RunError::Wait {
                result: Box::new(result),
                source,
            }),
        }
    }

    /// Kill once and give the OS a moment to reap the process.
    async fn terminate(&mut self) {
        if self.manager.kill() {
            match tokio::time::timeout(KILL_REAP_TIMEOUT, self.manager.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "waiting for killed process failed"),
                Err(_) => {
                    warn!(pid = ?self.manager.id(), "killed process was not reaped in time")
                }
            }
        }
    }

    fn report(&self, result: &ProcessResult) {
        info!(
            name = %result.name,
            pid = ?result.pid,
            state = ?result.state,
            exit_code = ?result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "{}",
            result
        );
        if let Some(registry) = &self.registry {
            registry.register_process(result);
        }
    }
}

async fn wait_end<M>(
    manager: &mut M,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> WaitEnd
where
    M: ProcessManager + ?Sized,
{
    // A token nobody else holds never fires.
    let token = cancel.cloned().unwrap_or_default();
    let limit = timeout.filter(|t| !t.is_zero());

    let waited = match limit {
        Some(limit) => tokio::time::timeout(limit, wait_for_exit_async(manager, &token)).await,
        None => Ok(wait_for_exit_async(manager, &token).await),
    };

    match waited {
        Err(_elapsed) => {
            info!(timeout = ?limit, "process timed out");
            WaitEnd::TimedOut
        }
        Ok(Ok(code)) => WaitEnd::Exited(code),
        Ok(Err(WaitError::Cancelled)) => {
            info!("cancellation requested; killing process");
            WaitEnd::Cancelled
        }
        Ok(Err(WaitError::Io(e))) => {
            warn!(error = %e, "waiting for process failed; killing process");
            WaitEnd::Failed(e)
        }
    }
}

/// Deliver output lines while `fut` is pending and return its result.
///
/// `fut` is polled first on every turn so a chatty process cannot starve
/// the timeout or the cancellation token.
async fn pump_output<F, D>(
    fut: F,
    mut output: Option<&mut mpsc::Receiver<Output>>,
    deliver: &mut D,
) -> F::Output
where
    F: Future,
    D: FnMut(Output),
{
    tokio::pin!(fut);
    let mut open = output.is_some();

    loop {
        tokio::select! {
            biased;
            res = &mut fut => return res,
            line = next_line(&mut output), if open => match line {
                Some(line) => deliver(line),
                None => open = false,
            },
        }
    }
}

async fn next_line(output: &mut Option<&mut mpsc::Receiver<Output>>) -> Option<Output> {
    match output {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// Deliver whatever is still buffered or in flight after the process ended.
async fn drain_output<D>(
    rx: &mut mpsc::Receiver<Output>,
    drain_timeout: Duration,
    deliver: &mut D,
) where
    D: FnMut(Output),
{
    let drained = tokio::time::timeout(drain_timeout, async {
        while let Some(line) = rx.recv().await {
            deliver(line);
        }
    })
    .await;

    if drained.is_err() {
        // Keep what already arrived, drop the rest. A live writer could
        // refill the channel forever, so take at most one buffer's worth.
        for _ in 0..OUTPUT_BUFFER {
            match rx.try_recv() {
                Ok(line) => deliver(line),
                Err(_) => break,
            }
        }
        rx.close();
        warn!(?drain_timeout, "output streams still open after exit; stopped reading");
    }
}
