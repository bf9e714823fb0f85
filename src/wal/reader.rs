//! WAL reader
//!
//! Sequential reader used during recovery. Yields parsed records in log
//! order; malformed lines surface as `Malformed` errors the caller can log
//! and skip.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::{Result, ShardError};

use super::WalRecord;

/// Iterates the records of one WAL file
pub struct WalReader {
    lines: Lines<BufReader<File>>,
}

impl WalReader {
    /// Open a WAL file for replay
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for WalReader {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                // Torn or binary garbage at the tail reads as invalid UTF-8;
                // report it as a malformed line so replay can continue.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Some(Err(ShardError::Malformed(
                        "non-text bytes in log".to_string(),
                    )));
                }
                Err(e) => return Some(Err(e.into())),
            };
            if line.is_empty() {
                continue;
            }
            return Some(WalRecord::parse(&line));
        }
    }
}
