// src/recovery/log.rs

//! Message log file: protocol lines appended back to back with no delimiters.
//! Boundaries come only from the index offsets.

use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;

/// Why log reading stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogCorruption {
    /// The computed message size is zero or negative.
    #[error("invalid size: entry {entry} spans {start}..{end}")]
    InvalidSize { entry: usize, start: u64, end: u64 },

    /// The log is shorter than the index claims.
    #[error("truncated log: entry {entry} ends at {end} but the log has {len} bytes")]
    Truncated { entry: usize, end: u64, len: u64 },
}

/// Lines read in index order, up to the first corruption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRead {
    pub lines: Vec<String>,
    pub corruption: Option<LogCorruption>,
}

/// Read one line per offset: line `k` spans `offsets[k-1]..offsets[k]`
/// (starting at 0 for the first).
pub fn read_messages<R: Read + Seek>(mut reader: R, offsets: &[u64]) -> io::Result<LogRead> {
    let mut read = LogRead::default();
    let len = reader.seek(SeekFrom::End(0))?;
    let mut start = 0u64;

    for (entry, &end) in offsets.iter().enumerate() {
        if end <= start {
            read.corruption = Some(LogCorruption::InvalidSize { entry, start, end });
            break;
        }
        if end > len {
            read.corruption = Some(LogCorruption::Truncated { entry, end, len });
            break;
        }

        reader.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start) as usize];
        reader.read_exact(&mut buf)?;
        read.lines.push(String::from_utf8_lossy(&buf).into_owned());

        start = end;
    }

    Ok(read)
}
