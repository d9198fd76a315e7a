// src/stats.rs

//! Registry of completed runs for later reporting.

use std::fmt;

use parking_lot::Mutex;

use crate::build::{BuildResult, TestSummary};
use crate::exec::{ProcessResult, ProcessState};

/// Receives every completed run.
pub trait RunRegistry: Send + Sync {
    /// Called exactly once per supervised process run.
    fn register_process(&self, result: &ProcessResult);

    /// Called once per build run, after the build result is frozen.
    fn register_build(&self, _result: &BuildResult) {}
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct Statistics {
    processes: Mutex<Vec<ProcessResult>>,
    builds: Mutex<Vec<BuildResult>>,
}

/// Aggregate over everything registered so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub runs: usize,
    pub failed_to_start: usize,
    pub canceled: usize,
    pub errors: usize,
    pub warnings: usize,
    pub tests: TestSummary,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processes(&self) -> Vec<ProcessResult> {
        self.processes.lock().clone()
    }

    pub fn builds(&self) -> Vec<BuildResult> {
        self.builds.lock().clone()
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for process in self.processes.lock().iter() {
            totals.runs += 1;
            match process.state {
                ProcessState::FailedToStart => totals.failed_to_start += 1,
                ProcessState::Canceled => totals.canceled += 1,
                ProcessState::Finished => {}
            }
        }
        for build in self.builds.lock().iter() {
            totals.errors += build.errors().len();
            totals.warnings += build.warnings().len();
            let summary = build.summary();
            totals.tests.total += summary.total;
            totals.tests.passed += summary.passed;
            totals.tests.failed += summary.failed;
            totals.tests.ignored += summary.ignored;
        }
        totals
    }
}

impl RunRegistry for Statistics {
    fn register_process(&self, result: &ProcessResult) {
        self.processes.lock().push(result.clone());
    }

    fn register_build(&self, result: &BuildResult) {
        self.builds.lock().push(result.clone());
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} runs ({} canceled, {} failed to start), {} errors, {} warnings",
            self.runs, self.canceled, self.failed_to_start, self.errors, self.warnings
        )?;
        if self.tests.total > 0 {
            write!(f, ", {}", self.tests)?;
        }
        Ok(())
    }
}
