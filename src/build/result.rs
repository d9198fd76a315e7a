// src/build/result.rs

use std::collections::HashMap;
use std::fmt;

use crate::build::message::BuildMessage;
use crate::build::test_result::{TestResult, TestState};
use crate::exec::{ProcessResult, ProcessState};

/// Test counts, with each `(suite, test)` pair counted once.
///
/// When a pair is reported several times, the most severe state wins
/// (see [`TestState::severity`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub ignored: usize,
}

impl TestSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut by_test: HashMap<(&str, &str), TestState> = HashMap::new();
        for result in results {
            by_test
                .entry((result.suite_name.as_str(), result.name.as_str()))
                .and_modify(|state| {
                    if result.state.severity() > state.severity() {
                        *state = result.state;
                    }
                })
                .or_insert(result.state);
        }

        let mut summary = TestSummary {
            total: by_test.len(),
            ..TestSummary::default()
        };
        for state in by_test.values() {
            match state {
                TestState::Passed => summary.passed += 1,
                TestState::Ignored => summary.ignored += 1,
                TestState::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tests: {} passed, {} failed, {} ignored",
            self.total, self.passed, self.failed, self.ignored
        )
    }
}

/// Immutable aggregate of one build run.
#[derive(Debug, Clone)]
pub struct BuildResult {
    process: ProcessResult,
    errors: Vec<BuildMessage>,
    warnings: Vec<BuildMessage>,
    tests: Vec<TestResult>,
    summary: TestSummary,
}

impl BuildResult {
    pub fn new(
        process: ProcessResult,
        errors: Vec<BuildMessage>,
        warnings: Vec<BuildMessage>,
        tests: Vec<TestResult>,
    ) -> Self {
        let summary = TestSummary::from_results(&tests);
        Self {
            process,
            errors,
            warnings,
            tests,
            summary,
        }
    }

    pub fn process(&self) -> &ProcessResult {
        &self.process
    }

    pub fn state(&self) -> ProcessState {
        self.process.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.process.exit_code
    }

    pub fn errors(&self) -> &[BuildMessage] {
        &self.errors
    }

    pub fn warnings(&self) -> &[BuildMessage] {
        &self.warnings
    }

    pub fn tests(&self) -> &[TestResult] {
        &self.tests
    }

    pub fn summary(&self) -> TestSummary {
        self.summary
    }

    /// Finished with exit code 0, no errors and no failed tests.
    pub fn is_success(&self) -> bool {
        self.process.is_success() && self.errors.is_empty() && self.summary.failed == 0
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; {} errors, {} warnings",
            self.process,
            self.errors.len(),
            self.warnings.len()
        )?;
        if self.summary.total > 0 {
            write!(f, "; {}", self.summary)?;
        }
        Ok(())
    }
}
