// src/exec/launch.rs

//! Launch specification and the output lines a supervised process produces.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::Stream;

/// Everything needed to start one external process.
///
/// Immutable once handed to a runner; output lines share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Short display name used in logs and descriptions.
    pub short_name: String,
}

impl LaunchSpec {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let short_name = default_short_name(&executable);
        Self {
            executable,
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            short_name,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn short_name(mut self, name: impl Into<String>) -> Self {
        self.short_name = name.into();
        self
    }

    /// Command line as a single string, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.executable.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn default_short_name(executable: &Path) -> String {
    executable
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| executable.display().to_string())
}

/// One line of output from a supervised process.
///
/// `handled` lets an [`OutputHandler`](crate::exec::OutputHandler) suppress the
/// default writer for this line.
#[derive(Debug, Clone)]
pub struct Output {
    pub spec: Arc<LaunchSpec>,
    pub stream: Stream,
    pub line: String,
    pub pid: u32,
    pub handled: bool,
}

impl Output {
    pub fn new(spec: Arc<LaunchSpec>, stream: Stream, line: impl Into<String>, pid: u32) -> Self {
        Self {
            spec,
            stream,
            line: line.into(),
            pid,
            handled: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.stream.is_error()
    }

    /// A copy of this line with different content, same origin.
    pub fn with_line(&self, line: impl Into<String>) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            stream: self.stream,
            line: line.into(),
            pid: self.pid,
            handled: false,
        }
    }

    /// A copy of this line with different content and stream.
    pub fn with_stream_line(&self, stream: Stream, line: impl Into<String>) -> Self {
        Self {
            stream,
            ..self.with_line(line)
        }
    }
}
