//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a record (and fsync) before any mutation is applied
//! - Sequence numbers for ordering, recovered from the file on open
//! - Crash recovery and replay, skipping malformed lines
//! - Truncation on checkpoint
//!
//! ## File Format
//! One JSON object per line:
//! ```text
//! {"seq":1,"op":"PUT","key":"user1","value":"value-1","timestamp":1700000000000000000}
//! {"seq":2,"op":"PUT","key":"user2","value":"value-2","timestamp":1700000000000001000}
//! ```
//! Lines decode independently, so a partial line left by a crash only
//! loses itself.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, RECORD_SEPARATOR};
pub use writer::Wal;
pub use reader::{Tail, WalReader, WalIterator};
pub use recovery::{WalRecovery, RecoveryResult};
