use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use buildtrace::exec::{BoxFuture, LaunchSpec, Output, ProcessManager, OUTPUT_BUFFER};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use buildtrace::types::Stream;

/// Pid reported by every fake process.
pub const FAKE_PID: u32 = 4242;

/// Counters shared between a `FakeProcess` and the test that created it.
#[derive(Debug, Clone, Default)]
pub struct FakeCounters {
    starts: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
    kill_calls: Arc<AtomicUsize>,
}

impl FakeCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Kill signals actually sent.
    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    /// `kill()` calls, including no-ops.
    pub fn kill_calls(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }
}

/// A scripted process that:
/// - emits a fixed list of output lines as soon as it starts
/// - optionally repeats one line until it is killed
/// - either exits with a fixed code or hangs until killed
/// - can fail to start, or fail its first wait.
#[derive(Debug)]
pub struct FakeProcess {
    lines: Vec<(Stream, String)>,
    repeat: Option<(Stream, String)>,
    exit_code: Option<i32>,
    hang: bool,
    keep_streams_open: bool,
    start_error: Option<io::ErrorKind>,
    wait_error: Option<io::ErrorKind>,

    counters: FakeCounters,
    output: Option<mpsc::Receiver<Output>>,
    held_sender: Option<mpsc::Sender<Output>>,
    writer: Option<JoinHandle<()>>,
    started: bool,
    exited: bool,
    killed: bool,
}

impl FakeProcess {
    /// A process that prints nothing and exits with `exit_code`.
    pub fn exiting(exit_code: i32) -> Self {
        Self {
            lines: Vec::new(),
            repeat: None,
            exit_code: Some(exit_code),
            hang: false,
            keep_streams_open: false,
            start_error: None,
            wait_error: None,
            counters: FakeCounters::default(),
            output: None,
            held_sender: None,
            writer: None,
            started: false,
            exited: false,
            killed: false,
        }
    }

    /// A process that never exits on its own.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            exit_code: None,
            ..Self::exiting(0)
        }
    }

    /// A process whose `start` fails with `kind`.
    pub fn failing_to_start(kind: io::ErrorKind) -> Self {
        Self {
            start_error: Some(kind),
            ..Self::exiting(0)
        }
    }

    /// A process that never exits and writes `line` to stdout as fast as
    /// the reader takes it.
    pub fn flooding(line: impl Into<String>) -> Self {
        Self {
            repeat: Some((Stream::StdOut, line.into())),
            ..Self::hanging()
        }
    }

    pub fn stdout(mut self, line: impl Into<String>) -> Self {
        self.lines.push((Stream::StdOut, line.into()));
        self
    }

    pub fn stderr(mut self, line: impl Into<String>) -> Self {
        self.lines.push((Stream::StdErr, line.into()));
        self
    }

    /// Keep the output channel open after exit, like a grandchild holding the pipe.
    pub fn keep_streams_open(mut self) -> Self {
        self.keep_streams_open = true;
        self
    }

    /// Make the first `wait()` fail with `kind`.
    pub fn failing_wait(mut self, kind: io::ErrorKind) -> Self {
        self.wait_error = Some(kind);
        self
    }

    pub fn counters(&self) -> FakeCounters {
        self.counters.clone()
    }
}

impl ProcessManager for FakeProcess {
    fn start(&mut self, spec: Arc<LaunchSpec>) -> io::Result<()> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.start_error {
            return Err(io::Error::new(kind, "scripted start failure"));
        }

        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER.max(self.lines.len()));
        for (stream, line) in &self.lines {
            let _ = tx.try_send(Output::new(Arc::clone(&spec), *stream, line.clone(), FAKE_PID));
        }
        if let Some((stream, line)) = self.repeat.clone() {
            let tx = tx.clone();
            self.writer = Some(tokio::spawn(async move {
                loop {
                    let output = Output::new(Arc::clone(&spec), stream, line.clone(), FAKE_PID);
                    if tx.send(output).await.is_err() {
                        break;
                    }
                }
            }));
        }
        if self.keep_streams_open {
            self.held_sender = Some(tx);
        }
        self.output = Some(rx);
        self.started = true;
        Ok(())
    }

    fn take_output(&mut self) -> Option<mpsc::Receiver<Output>> {
        self.output.take()
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            if let Some(kind) = self.wait_error.take() {
                return Err(io::Error::new(kind, "scripted wait failure"));
            }
            if self.killed {
                self.exited = true;
                return Ok(None);
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.exited = true;
            Ok(self.exit_code)
        })
    }

    fn kill(&mut self) -> bool {
        self.counters.kill_calls.fetch_add(1, Ordering::SeqCst);
        if !self.started || self.exited || self.killed {
            return false;
        }
        self.killed = true;
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn id(&self) -> Option<u32> {
        self.started.then_some(FAKE_PID)
    }

    fn exit_code(&self) -> Option<i32> {
        if self.exited && !self.killed {
            self.exit_code
        } else {
            None
        }
    }
}
