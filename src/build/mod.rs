// src/build/mod.rs

//! Build-event reconstruction.
//!
//! The pure state lives in [`context`]: it turns decoded service messages and
//! plain output lines into build messages, per-test results and the
//! errors/warnings aggregates. [`runner`] is the async shell that feeds it
//! from a supervised process and freezes the final [`BuildResult`].

pub mod context;
pub mod message;
pub mod result;
pub mod runner;
pub mod sink;
pub mod test_result;

pub use context::{BuildContext, BuildEvents};
pub use message::{BuildMessage, BuildMessageState, Importance, SourceRange};
pub use result::{BuildResult, TestSummary};
pub use runner::{BuildOutputHandler, BuildRunner};
pub use sink::{BuildMessageSink, ConsoleMessageSink, TracingMessageSink};
pub use test_result::{TestKey, TestResult, TestState};
