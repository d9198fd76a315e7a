// src/recovery/mod.rs

//! Side-channel recovery.
//!
//! Some CI agents redirect bulky service-message traffic into an index file
//! plus a message log in a service-messages directory, and only print a small
//! reference event (`source='<name>'`) on stdout. This module:
//! - reads the index ([`index`]) and the message log ([`log`]),
//! - wraps a build context so references are recorded instead of processed
//!   and replayed once the process has exited ([`reliable`]).
//!
//! Corruption in either file is reported as a warning through a
//! [`DiagnosticSink`]; whatever was read before the corruption is still used.

pub mod index;
pub mod log;
pub mod reliable;

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

pub use index::{read_index, IndexCorruption, IndexRead};
pub use log::{read_messages, LogCorruption, LogRead};
pub use reliable::ReliableBuildContext;

/// Suffix appended to the index file name to get the message log.
pub const MESSAGE_LOG_SUFFIX: &str = ".msg";

/// Receives warnings about unreadable or corrupt side-channel files.
pub trait DiagnosticSink: Send + Sync {
    fn warning(&self, text: &str);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warning(&self, text: &str) {
        warn!("{}", text);
    }
}

/// `<index>.msg`
pub fn message_log_path(index_path: &Path) -> PathBuf {
    let mut path: OsString = index_path.as_os_str().to_owned();
    path.push(MESSAGE_LOG_SUFFIX);
    PathBuf::from(path)
}

/// Lines recovered from one index/log pair, plus any corruption warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
}

/// Read the index at `index_path` and the message log at `log_path`.
pub fn read_replay(index_path: &Path, log_path: &Path) -> io::Result<Replay> {
    let mut replay = Replay::default();

    let index = read_index(BufReader::new(File::open(index_path)?))?;
    if let Some(corruption) = &index.corruption {
        replay.warnings.push(format!(
            "service messages index {}: {}",
            index_path.display(),
            corruption
        ));
    }

    let log = read_messages(BufReader::new(File::open(log_path)?), &index.offsets)?;
    if let Some(corruption) = &log.corruption {
        replay.warnings.push(format!(
            "service messages log {}: {}",
            log_path.display(),
            corruption
        ));
    }

    replay.lines = log.lines;
    Ok(replay)
}
