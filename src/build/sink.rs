// src/build/sink.rs

use std::io::{self, Write};

use tracing::{debug, error, info, warn};

use crate::build::message::{BuildMessage, BuildMessageState};

/// Destination for build messages as they are produced.
pub trait BuildMessageSink: Send + Sync {
    fn emit(&self, message: &BuildMessage);
}

/// Logs build messages through `tracing`, leveled by state.
#[derive(Debug, Clone, Default)]
pub struct TracingMessageSink;

impl BuildMessageSink for TracingMessageSink {
    fn emit(&self, message: &BuildMessage) {
        match message.state {
            BuildMessageState::StdOut => info!(target: "buildtrace::output", "{}", message),
            BuildMessageState::Warning => warn!(target: "buildtrace::output", "{}", message),
            BuildMessageState::StdError
            | BuildMessageState::Failure
            | BuildMessageState::BuildProblem => {
                error!(target: "buildtrace::output", "{}", message)
            }
            BuildMessageState::ServiceMessage | BuildMessageState::TestResult => {
                debug!(target: "buildtrace::output", state = ?message.state, "{}", message)
            }
        }
    }
}

/// Prints build messages to this process's stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMessageSink;

impl BuildMessageSink for ConsoleMessageSink {
    fn emit(&self, message: &BuildMessage) {
        let res = match message.state {
            BuildMessageState::StdOut | BuildMessageState::TestResult => {
                writeln!(io::stdout().lock(), "{}", message)
            }
            BuildMessageState::Warning => writeln!(io::stderr().lock(), "warning: {}", message),
            BuildMessageState::StdError => writeln!(io::stderr().lock(), "{}", message),
            BuildMessageState::Failure | BuildMessageState::BuildProblem => {
                writeln!(io::stderr().lock(), "error: {}", message)
            }
            BuildMessageState::ServiceMessage => Ok(()),
        };
        if let Err(e) = res {
            debug!(error = %e, "failed to print build message");
        }
    }
}
