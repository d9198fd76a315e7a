// src/build/context.rs

//! Stateful build context.
//!
//! Consumes decoded service messages and plain output lines for one process
//! run and accumulates:
//! - per-test output while a test is open,
//! - the errors and warnings aggregates,
//! - finished test results.
//!
//! All mutable state sits behind one lock because output arrives from reader
//! tasks while the controlling task may be finishing the run.

use std::collections::{HashMap, HashSet};
use std::mem;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::build::message::{BuildMessage, BuildMessageState};
use crate::build::result::BuildResult;
use crate::build::test_result::{TestKey, TestResult, TestState};
use crate::exec::{Output, ProcessResult};
use crate::protocol::{MessageKind, ServiceMessage};
use crate::types::Stream;

/// Seam shared by [`BuildContext`] and the recovery wrapper around it.
pub trait BuildEvents: Send + Sync {
    /// Handle one service message decoded from `output`.
    fn process_message(&self, output: &Output, message: &ServiceMessage) -> Vec<BuildMessage>;

    /// Handle a line that carried no service messages.
    fn process_output(&self, output: &Output) -> Vec<BuildMessage>;

    /// Freeze everything accumulated so far into the run's result.
    fn finish(&self, process: ProcessResult) -> BuildResult;
}

#[derive(Debug, Default)]
struct TestContext {
    output: Vec<Output>,
}

#[derive(Debug, Default)]
struct State {
    tests: HashMap<TestKey, TestContext>,
    /// Keys closed by `testIgnored` / `testFailed`. Their `testFinished`
    /// events are swallowed until test output reopens the key.
    closed: HashSet<TestKey>,
    errors: Vec<BuildMessage>,
    warnings: Vec<BuildMessage>,
    results: Vec<TestResult>,
}

impl State {
    fn take_output(&mut self, key: &TestKey) -> Vec<Output> {
        self.tests.remove(key).map(|ctx| ctx.output).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct BuildContext {
    state: Mutex<State>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_test_output(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
        stream: Stream,
    ) -> Vec<BuildMessage> {
        let key = TestKey::from_message(message);
        let text = message.attribute("out").unwrap_or_default();
        let line = output.with_stream_line(stream, text);

        state.closed.remove(&key);
        state
            .tests
            .entry(key)
            .or_default()
            .output
            .push(line.clone());

        let msg_state = match stream {
            Stream::StdOut => BuildMessageState::StdOut,
            Stream::StdErr => BuildMessageState::StdError,
        };
        let build_message = BuildMessage::new(msg_state, text)
            .with_output(line)
            .with_message(message.clone());

        if stream.is_error() {
            state.errors.push(build_message.clone());
        }
        vec![build_message]
    }

    fn on_test_finished(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
    ) -> Vec<BuildMessage> {
        let key = TestKey::from_message(message);
        if state.closed.contains(&key) {
            debug!(
                suite = %key.suite,
                test = %key.name,
                flow = %key.flow_id,
                "ignoring testFinished for a test already closed as ignored/failed"
            );
            return Vec::new();
        }

        let test_output = state.take_output(&key);
        Self::record(state, output, message, TestState::Passed, test_output)
    }

    fn on_test_closed(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
        test_state: TestState,
    ) -> Vec<BuildMessage> {
        let key = TestKey::from_message(message);
        let test_output = state.take_output(&key);
        state.closed.insert(key);
        Self::record(state, output, message, test_state, test_output)
    }

    fn record(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
        test_state: TestState,
        test_output: Vec<Output>,
    ) -> Vec<BuildMessage> {
        let result = TestResult::from_message(test_state, message, test_output);
        debug!(
            suite = %result.suite_name,
            test = %result.name,
            state = %result.state,
            duration_ms = result.duration.as_millis() as u64,
            "test result recorded"
        );

        let build_message = BuildMessage::new(BuildMessageState::TestResult, result.to_string())
            .with_output(output.clone())
            .with_message(message.clone());
        state.results.push(result);
        vec![build_message]
    }

    fn on_message(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
    ) -> Vec<BuildMessage> {
        let text = message
            .attribute("text")
            .or(message.value())
            .unwrap_or_default();
        let msg_state = BuildMessageState::from_status(message.attribute("status"));

        let build_message = BuildMessage::new(msg_state, text)
            .with_diagnostics(message)
            .with_output(output.clone())
            .with_message(message.clone());

        if !build_message.is_blank() {
            if msg_state.is_warning() {
                state.warnings.push(build_message.clone());
            } else if msg_state.is_error() {
                state.errors.push(build_message.clone());
            }
        }
        vec![build_message]
    }

    fn on_build_problem(
        state: &mut State,
        output: &Output,
        message: &ServiceMessage,
    ) -> Vec<BuildMessage> {
        let text = message
            .attribute("description")
            .or(message.value())
            .unwrap_or_default();
        let mut build_message = BuildMessage::new(BuildMessageState::BuildProblem, text)
            .with_output(output.clone())
            .with_message(message.clone());
        build_message.code = message.non_blank("identity").map(str::to_string);

        state.errors.push(build_message.clone());
        vec![build_message]
    }
}

impl BuildEvents for BuildContext {
    fn process_message(&self, output: &Output, message: &ServiceMessage) -> Vec<BuildMessage> {
        trace!(message = %message, "processing service message");
        let mut state = self.state.lock();

        match message.kind() {
            MessageKind::TestStdOut => {
                Self::on_test_output(&mut state, output, message, Stream::StdOut)
            }
            MessageKind::TestStdErr => {
                Self::on_test_output(&mut state, output, message, Stream::StdErr)
            }
            MessageKind::TestFinished => Self::on_test_finished(&mut state, output, message),
            MessageKind::TestIgnored => {
                Self::on_test_closed(&mut state, output, message, TestState::Ignored)
            }
            MessageKind::TestFailed => {
                Self::on_test_closed(&mut state, output, message, TestState::Failed)
            }
            MessageKind::Message => Self::on_message(&mut state, output, message),
            MessageKind::BuildProblem => Self::on_build_problem(&mut state, output, message),
            MessageKind::Other(name) => {
                trace!(name = %name, "uninterpreted service message");
                vec![
                    BuildMessage::new(BuildMessageState::ServiceMessage, message.to_string())
                        .with_output(output.clone())
                        .with_message(message.clone()),
                ]
            }
        }
    }

    fn process_output(&self, output: &Output) -> Vec<BuildMessage> {
        let msg_state = match output.stream {
            Stream::StdOut => BuildMessageState::StdOut,
            Stream::StdErr => BuildMessageState::StdError,
        };
        let build_message =
            BuildMessage::new(msg_state, output.line.clone()).with_output(output.clone());

        if output.is_error() {
            self.state.lock().errors.push(build_message.clone());
        }
        vec![build_message]
    }

    fn finish(&self, process: ProcessResult) -> BuildResult {
        let state = mem::take(&mut *self.state.lock());

        if !state.tests.is_empty() {
            debug!(
                open_tests = state.tests.len(),
                "discarding output of tests that never reported a terminal event"
            );
        }

        BuildResult::new(process, state.errors, state.warnings, state.results)
    }
}
