// src/build/runner.rs

//! Wires the process supervisor to the decoder and the build context.
//!
//! supervisor -> decoder -> recovery layer -> build context -> [`BuildResult`]

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::build::context::{BuildContext, BuildEvents};
use crate::build::result::BuildResult;
use crate::build::sink::{BuildMessageSink, TracingMessageSink};
use crate::config::{CiSettings, Settings};
use crate::errors::{Result, RunError};
use crate::exec::{
    LaunchSpec, Output, OutputHandler, ProcessManager, ProcessRunner, RunOptions,
    TokioProcessManager,
};
use crate::protocol::ServiceMessageDecoder;
use crate::recovery::{DiagnosticSink, ReliableBuildContext, TracingDiagnostics};
use crate::stats::RunRegistry;

/// Output handler that feeds each line through the decoder into a build
/// context and emits the resulting build messages.
///
/// Every line it sees is marked handled; rendering is the sink's job.
pub struct BuildOutputHandler<'a, C: BuildEvents> {
    decoder: &'a ServiceMessageDecoder,
    context: &'a C,
    sink: &'a dyn BuildMessageSink,
}

impl<'a, C: BuildEvents> BuildOutputHandler<'a, C> {
    pub fn new(
        decoder: &'a ServiceMessageDecoder,
        context: &'a C,
        sink: &'a dyn BuildMessageSink,
    ) -> Self {
        Self {
            decoder,
            context,
            sink,
        }
    }
}

impl<C: BuildEvents> OutputHandler for BuildOutputHandler<'_, C> {
    fn handle(&mut self, output: &mut Output) {
        let messages = self.decoder.decode(&output.line);

        let emitted = if messages.is_empty() {
            self.context.process_output(output)
        } else {
            messages
                .iter()
                .flat_map(|message| self.context.process_message(output, message))
                .collect()
        };

        for message in &emitted {
            self.sink.emit(message);
        }
        output.handled = true;
    }
}

/// Runs one external tool per call and reconstructs its [`BuildResult`].
pub struct BuildRunner {
    settings: Arc<Settings>,
    decoder: ServiceMessageDecoder,
    sink: Arc<dyn BuildMessageSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    registry: Option<Arc<dyn RunRegistry>>,
}

impl fmt::Debug for BuildRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRunner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BuildRunner {
    pub fn new(settings: Settings) -> Result<Self> {
        let decoder = ServiceMessageDecoder::new(&settings.marker)?;
        Ok(Self {
            settings: Arc::new(settings),
            decoder,
            sink: Arc::new(TracingMessageSink),
            diagnostics: Arc::new(TracingDiagnostics),
            registry: None,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn BuildMessageSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `spec` as a real child process.
    pub async fn run(
        &self,
        spec: LaunchSpec,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<BuildResult, RunError> {
        self.run_with(TokioProcessManager::new(), spec, cancel).await
    }

    /// Run `spec` on the given process backend.
    ///
    /// A timeout yields a `Canceled` build result; caller cancellation and
    /// wait failures are returned as [`RunError`] without a build result.
    pub async fn run_with<M: ProcessManager>(
        &self,
        manager: M,
        spec: LaunchSpec,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<BuildResult, RunError> {
        let ci_settings: Arc<dyn CiSettings> = self.settings.clone();
        let context =
            ReliableBuildContext::new(BuildContext::new(), ci_settings, self.decoder.clone())
                .with_diagnostics(Arc::clone(&self.diagnostics))
                .with_sink(Arc::clone(&self.sink));

        let mut runner =
            ProcessRunner::new(manager).with_drain_timeout(self.settings.drain_timeout);
        if let Some(registry) = &self.registry {
            runner = runner.with_registry(Arc::clone(registry));
        }

        let options = RunOptions {
            timeout: self.settings.timeout,
            cancel,
        };

        let process = {
            let mut handler = BuildOutputHandler::new(&self.decoder, &context, self.sink.as_ref());
            runner.run(spec, &mut handler, options).await?
        };

        let result = context.finish(process);
        debug!(result = %result, "build result created");

        if let Some(registry) = &self.registry {
            registry.register_build(&result);
        }
        Ok(result)
    }
}
