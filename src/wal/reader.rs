//! WAL Reader
//!
//! Reads entries from the WAL file one line at a time. Lines that do not
//! decode are counted and skipped; only I/O failures are errors.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use super::entry::RECORD_SEPARATOR;
use super::WalEntry;

/// State of the bytes after the last record separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tail {
    /// File is empty or ends with a separator
    #[default]
    Clean,

    /// Last record decoded but is missing its separator
    Unterminated,

    /// Last line is partial garbage starting at `offset` (crash mid-write)
    Torn { offset: u64 },
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the next unread line
    offset: u64,
    skipped: u64,
    tail: Tail,
    line: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            skipped: 0,
            tail: Tail::Clean,
            line: Vec::new(),
        })
    }

    /// Read the next well-formed entry, skipping malformed lines
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        loop {
            self.line.clear();
            let start = self.offset;
            let read = self.reader.read_until(RECORD_SEPARATOR, &mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            self.offset += read as u64;

            let terminated = self.line.last() == Some(&RECORD_SEPARATOR);
            let trimmed = self.line.trim_ascii();
            if trimmed.is_empty() {
                if !terminated {
                    self.tail = Tail::Torn { offset: start };
                }
                continue;
            }

            match WalEntry::decode(trimmed) {
                Ok(entry) => {
                    if !terminated {
                        self.tail = Tail::Unterminated;
                    }
                    return Ok(Some(entry));
                }
                Err(err) => {
                    self.skipped += 1;
                    if !terminated {
                        self.tail = Tail::Torn { offset: start };
                    }
                    warn!(offset = start, error = %err, "skipping malformed WAL record");
                }
            }
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self, done: false }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Tail state; meaningful once the reader hit end of file
    pub fn tail(&self) -> Tail {
        self.tail
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
