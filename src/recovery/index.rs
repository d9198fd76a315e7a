// src/recovery/index.rs

//! Index file: a flat run of 8-byte big-endian end offsets into the companion
//! message log. Offsets must be strictly increasing.

use std::io::{self, ErrorKind, Read};

use thiserror::Error;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = 8;

/// Why index reading stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexCorruption {
    /// Fewer than 8 bytes left at the end of the file.
    #[error("invalid size: entry {entry} has only {bytes} of 8 bytes")]
    InvalidSize { entry: usize, bytes: usize },

    /// An offset that does not increase on the previous one.
    #[error("invalid index: entry {entry} offset {offset} is not greater than {previous}")]
    InvalidIndex {
        entry: usize,
        previous: u64,
        offset: u64,
    },
}

/// Offsets read before EOF or before the first corruption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRead {
    pub offsets: Vec<u64>,
    pub corruption: Option<IndexCorruption>,
}

/// Read all usable offsets from `reader`.
///
/// Corruption ends reading but is not an error: the offsets read so far are
/// returned together with the reason. Only I/O failures are errors.
pub fn read_index<R: Read>(mut reader: R) -> io::Result<IndexRead> {
    let mut read = IndexRead::default();
    let mut buf = [0u8; INDEX_ENTRY_SIZE];

    loop {
        let entry = read.offsets.len();
        let filled = fill(&mut reader, &mut buf)?;
        if filled == 0 {
            break;
        }
        if filled < INDEX_ENTRY_SIZE {
            read.corruption = Some(IndexCorruption::InvalidSize {
                entry,
                bytes: filled,
            });
            break;
        }

        let offset = u64::from_be_bytes(buf);
        if let Some(&previous) = read.offsets.last() {
            if offset <= previous {
                read.corruption = Some(IndexCorruption::InvalidIndex {
                    entry,
                    previous,
                    offset,
                });
                break;
            }
        }
        read.offsets.push(offset);
    }

    Ok(read)
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
