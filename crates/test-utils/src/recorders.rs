use std::sync::{Arc, Mutex};

use buildtrace::build::{BuildMessage, BuildMessageSink};
use buildtrace::exec::{Output, OutputWriter};
use buildtrace::recovery::DiagnosticSink;

/// Collects build messages emitted during a run.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<BuildMessage>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<BuildMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}

impl BuildMessageSink for RecordingSink {
    fn emit(&self, message: &BuildMessage) {
        self.messages.lock().unwrap().push(message.clone());
    }
}

/// Collects lines that no output handler claimed.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    lines: Arc<Mutex<Vec<Output>>>,
}

impl RecordingWriter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|o| o.line.clone()).collect()
    }
}

impl OutputWriter for RecordingWriter {
    fn write(&self, output: &Output) {
        self.lines.lock().unwrap().push(output.clone());
    }
}

/// Collects recovery warnings.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    warnings: Arc<Mutex<Vec<String>>>,
}

impl RecordingDiagnostics {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn warning(&self, text: &str) {
        self.warnings.lock().unwrap().push(text.to_string());
    }
}
