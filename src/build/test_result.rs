// src/build/test_result.rs

//! Per-test identity and outcomes.

use std::fmt;
use std::time::Duration;

use crate::exec::Output;
use crate::protocol::ServiceMessage;

/// Identity of one logical test execution: `(suite, test, flow)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestKey {
    pub suite: String,
    pub name: String,
    pub flow_id: String,
}

impl TestKey {
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        flow_id: impl Into<String>,
    ) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
            flow_id: flow_id.into(),
        }
    }

    /// Key from `suiteName` / `name` / `flowId`; missing parts are empty.
    pub fn from_message(message: &ServiceMessage) -> Self {
        let part = |key: &str| message.attribute(key).unwrap_or_default().to_string();
        Self {
            suite: part("suiteName"),
            name: part("name"),
            flow_id: part("flowId"),
        }
    }
}

/// Terminal state of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestState {
    Passed,
    Ignored,
    Failed,
}

impl TestState {
    /// Rank used when one test is reported more than once: the highest wins.
    ///
    /// `Failed > Ignored > Passed`.
    pub fn severity(self) -> u8 {
        match self {
            TestState::Passed => 0,
            TestState::Ignored => 1,
            TestState::Failed => 2,
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestState::Passed => f.write_str("passed"),
            TestState::Ignored => f.write_str("ignored"),
            TestState::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one test, frozen when its terminal event is processed.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub state: TestState,
    pub suite_name: String,
    pub name: String,
    pub display_name: String,
    pub fully_qualified_name: String,
    pub duration: Duration,
    pub message: String,
    pub details: String,
    pub output: Vec<Output>,
    pub executor: Option<String>,
    pub line_number: Option<u32>,
}

impl TestResult {
    /// Build from a terminal test event and the output accumulated for it.
    pub fn from_message(state: TestState, message: &ServiceMessage, output: Vec<Output>) -> Self {
        let key = TestKey::from_message(message);
        let text = |k: &str| message.attribute(k).unwrap_or_default().to_string();

        let display_name = message
            .non_blank("displayName")
            .map(str::to_string)
            .unwrap_or_else(|| key.name.clone());
        let fully_qualified_name = message
            .non_blank("fullyQualifiedName")
            .map(str::to_string)
            .unwrap_or_else(|| {
                if key.suite.is_empty() {
                    key.name.clone()
                } else {
                    format!("{}.{}", key.suite, key.name)
                }
            });

        Self {
            state,
            duration: parse_duration_ms(message.attribute("duration")),
            message: text("message"),
            details: text("details"),
            executor: message.non_blank("executor").map(str::to_string),
            line_number: message
                .attribute("lineNumber")
                .and_then(|v| v.trim().parse().ok()),
            display_name,
            fully_qualified_name,
            suite_name: key.suite,
            name: key.name,
            output,
        }
    }

    /// All accumulated output text, one line per entry.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .map(|o| o.line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} ms)",
            self.display_name,
            self.state,
            self.duration.as_millis()
        )?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Milliseconds attribute; absent or malformed values are zero.
pub fn parse_duration_ms(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}
