#![allow(dead_code, unused_imports)]

pub use buildtrace_test_utils::builders;
pub use buildtrace_test_utils::{init_tracing, with_timeout};

use std::sync::Arc;

use buildtrace::exec::{LaunchSpec, Output};
use buildtrace::protocol::{ServiceMessage, ServiceMessageDecoder};
use buildtrace::types::Stream;

/// Marker used by tests that do not exercise the default one.
pub const TEST_MARKER: &str = "marker";

pub fn spec() -> Arc<LaunchSpec> {
    Arc::new(LaunchSpec::new("/usr/bin/tool").short_name("tool"))
}

pub fn stdout(line: &str) -> Output {
    Output::new(spec(), Stream::StdOut, line, 100)
}

pub fn stderr(line: &str) -> Output {
    Output::new(spec(), Stream::StdErr, line, 100)
}

/// Decode a line that must contain exactly one event with the default marker.
pub fn decode_one(line: &str) -> ServiceMessage {
    let decoder = ServiceMessageDecoder::new(buildtrace::config::DEFAULT_MARKER)
        .expect("default marker is valid");
    let mut messages = decoder.decode(line);
    assert_eq!(messages.len(), 1, "expected one event in {line:?}");
    messages.remove(0)
}
