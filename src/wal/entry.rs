//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their
//! one-line JSON encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KdbError, Result};

/// Line terminator between records
pub const RECORD_SEPARATOR: u8 = b'\n';

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Sequence number - strictly increasing within one WAL generation.
    /// Logs written elsewhere may carry any integer here, negative included.
    pub seq: i64,

    /// The operation to perform
    #[serde(rename = "op")]
    pub operation: Operation,

    /// Original string key (not the hash)
    pub key: String,

    #[serde(default)]
    pub value: String,

    /// Timestamp (unix nanos) when entry was created
    #[serde(default)]
    pub timestamp: i64,
}

/// Operations that can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Put a key-value pair
    Put,

    /// Delete a key
    Delete,

    /// Any operation this build does not know about
    #[serde(other)]
    Unknown,
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(seq: i64, operation: Operation, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            seq,
            operation,
            key: key.into(),
            value: value.into(),
            timestamp: now_nanos(),
        }
    }

    /// Encode as one JSON line, separator included
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(RECORD_SEPARATOR);
        Ok(line)
    }

    /// Decode a single line (separator optional)
    pub fn decode(line: &[u8]) -> Result<Self> {
        let line = line.strip_suffix(&[RECORD_SEPARATOR]).unwrap_or(line);
        serde_json::from_slice(line).map_err(|e| KdbError::WalCorruption(e.to_string()))
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
