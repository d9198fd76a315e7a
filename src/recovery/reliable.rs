// src/recovery/reliable.rs

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::build::{BuildEvents, BuildMessage, BuildMessageSink, BuildResult};
use crate::config::CiSettings;
use crate::exec::{Output, ProcessResult};
use crate::protocol::{ServiceMessage, ServiceMessageDecoder};
use crate::recovery::{message_log_path, read_replay, DiagnosticSink, TracingDiagnostics};
use crate::types::CiType;

/// Build context wrapper that defers `source` references to side-channel
/// replay.
///
/// While the process runs, any event with a non-blank `source` attribute is
/// recorded (source name -> placeholder output line) and produces no build
/// message. Every other event goes straight to the inner context. On
/// [`finish`](BuildEvents::finish) each recorded source is replayed through
/// the inner context before the result is frozen.
///
/// Interception only happens on a TeamCity agent with a service-messages
/// directory; elsewhere the wrapper is transparent.
pub struct ReliableBuildContext<C: BuildEvents> {
    inner: C,
    settings: Arc<dyn CiSettings>,
    decoder: ServiceMessageDecoder,
    diagnostics: Arc<dyn DiagnosticSink>,
    sink: Option<Arc<dyn BuildMessageSink>>,
    sources: Mutex<BTreeMap<String, Output>>,
}

impl<C: BuildEvents> ReliableBuildContext<C> {
    pub fn new(inner: C, settings: Arc<dyn CiSettings>, decoder: ServiceMessageDecoder) -> Self {
        Self {
            inner,
            settings,
            decoder,
            diagnostics: Arc::new(TracingDiagnostics),
            sink: None,
            sources: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Where replayed build messages are emitted.
    pub fn with_sink(mut self, sink: Arc<dyn BuildMessageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Source names recorded so far and not yet replayed.
    pub fn pending_sources(&self) -> Vec<String> {
        self.sources.lock().keys().cloned().collect()
    }

    fn intercepts(&self) -> bool {
        self.settings.ci_type() == CiType::TeamCity
            && self.settings.service_messages_dir().is_some()
    }

    fn replay(&self, source: &str, placeholder: &Output) {
        let Some(dir) = self.settings.service_messages_dir() else {
            return;
        };

        let index_path = dir.join(source);
        if !index_path.is_file() {
            debug!(source, path = ?index_path, "no index file for source; skipping");
            return;
        }
        let log_path = message_log_path(&index_path);
        if !log_path.is_file() {
            debug!(source, path = ?log_path, "no message log for source; skipping");
            return;
        }

        let replay = match read_replay(&index_path, &log_path) {
            Ok(replay) => replay,
            Err(e) => {
                self.diagnostics.warning(&format!(
                    "cannot read service messages for source '{source}' from {}: {e}",
                    index_path.display()
                ));
                return;
            }
        };
        for warning in &replay.warnings {
            self.diagnostics.warning(warning);
        }

        let mut events = 0usize;
        for line in &replay.lines {
            for message in self.decoder.decode(line) {
                events += 1;
                let emitted = self.inner.process_message(placeholder, &message);
                self.emit(&emitted);
            }
        }

        info!(source, lines = replay.lines.len(), events, "replayed service messages");
    }

    fn emit(&self, messages: &[BuildMessage]) {
        if let Some(sink) = &self.sink {
            for message in messages {
                sink.emit(message);
            }
        }
    }
}

impl<C: BuildEvents> BuildEvents for ReliableBuildContext<C> {
    fn process_message(&self, output: &Output, message: &ServiceMessage) -> Vec<BuildMessage> {
        if self.intercepts() {
            if let Some(source) = message.non_blank("source") {
                debug!(source, name = message.name(), "deferring side-channel source");
                self.sources
                    .lock()
                    .entry(source.to_string())
                    .or_insert_with(|| output.with_line(""));
                return Vec::new();
            }
        }

        self.inner.process_message(output, message)
    }

    fn process_output(&self, output: &Output) -> Vec<BuildMessage> {
        self.inner.process_output(output)
    }

    fn finish(&self, process: ProcessResult) -> BuildResult {
        let sources = mem::take(&mut *self.sources.lock());
        for (source, placeholder) in &sources {
            self.replay(source, placeholder);
        }

        self.inner.finish(process)
    }
}
