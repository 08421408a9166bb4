//! WAL Writer
//!
//! The `Wal` handle: appends records, recovers them, and truncates the log
//! on checkpoint.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::WalSyncStrategy;
use crate::error::{KdbError, Result};
use super::{Operation, Tail, WalEntry, WalRecovery};

/// First sequence number of a fresh or truncated log
const INITIAL_SEQ: i64 = 1;

/// Append-only write-ahead log
///
/// The file handle and sequence counter live behind one mutex, so each
/// `log` call (assign sequence, write, flush) is atomic with respect to
/// other callers.
pub struct Wal {
    path: PathBuf,
    sync_strategy: WalSyncStrategy,
    state: Mutex<WalState>,
}

struct WalState {
    /// `None` once closed
    file: Option<File>,
    /// `None` once the last record used `i64::MAX`
    next_seq: Option<i64>,
    /// Records written since the last fsync
    uncommitted: usize,
}

impl Wal {
    /// Open or create a WAL file, fsyncing every record
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, WalSyncStrategy::EveryWrite)
    }

    /// Open or create a WAL file with an explicit sync strategy
    ///
    /// Scans the existing file to pick up the next sequence number.
    /// Malformed lines are skipped; a torn last line is repaired so the
    /// next append starts on a fresh line.
    pub fn open_with(path: impl AsRef<Path>, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_append(&path)?;

        let next_seq = match WalRecovery::verify(&path) {
            Ok(scan) => {
                repair_tail(&mut file, scan.tail, &path);
                if scan.entries_corrupted > 0 {
                    warn!(
                        path = %path.display(),
                        corrupted = scan.entries_corrupted,
                        "WAL contains malformed records"
                    );
                }
                let next_seq = scan.last_seq.checked_add(1);
                if next_seq.is_none() {
                    warn!(path = %path.display(), "WAL sequence numbers exhausted, appends fail until checkpoint");
                }
                next_seq
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "WAL scan failed, sequence restarts");
                Some(INITIAL_SEQ)
            }
        };

        info!(path = %path.display(), next_seq = ?next_seq, "WAL opened");

        Ok(Self {
            path,
            sync_strategy,
            state: Mutex::new(WalState {
                file: Some(file),
                next_seq,
                uncommitted: 0,
            }),
        })
    }

    /// Append a record and return its sequence number
    ///
    /// With `EveryWrite` the record is on disk when this returns. On failure
    /// nothing is committed: the sequence counter does not move and any
    /// partially written bytes are cut off again. Once a record has used
    /// `i64::MAX` every call fails with `SequenceExhausted` until `truncate`.
    pub fn log(&self, operation: Operation, key: &str, value: &str) -> Result<i64> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let seq = state.next_seq.ok_or(KdbError::SequenceExhausted)?;
        let line = WalEntry::new(seq, operation, key, value).encode()?;

        let sync_now = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => state.uncommitted + 1 >= count,
        };

        let file = state.file.as_mut().ok_or(KdbError::WalClosed)?;
        let start = file.metadata()?.len();

        let written = file
            .write_all(&line)
            .and_then(|()| if sync_now { file.sync_all() } else { Ok(()) });

        if let Err(err) = written {
            if let Err(rollback) = file.set_len(start) {
                warn!(path = %self.path.display(), error = %rollback, "could not roll back torn WAL write");
            }
            return Err(KdbError::WalWrite(err.to_string()));
        }

        state.next_seq = seq.checked_add(1);
        state.uncommitted = if sync_now { 0 } else { state.uncommitted + 1 };
        debug!(seq, op = ?operation, key, "WAL record appended");

        Ok(seq)
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        let file = state.file.as_mut().ok_or(KdbError::WalClosed)?;
        file.sync_all()?;
        state.uncommitted = 0;
        Ok(())
    }

    /// Read back every well-formed record in file order
    pub fn recover(&self) -> Result<Vec<WalEntry>> {
        let (entries, result) = WalRecovery::recover(&self.path)?;
        info!(
            path = %self.path.display(),
            recovered = result.entries_recovered,
            corrupted = result.entries_corrupted,
            last_seq = result.last_seq,
            "WAL recovery"
        );
        Ok(entries)
    }

    /// Discard every record and restart sequencing at 1
    ///
    /// Nothing snapshots the caller's state first: after this the WAL holds
    /// no history at all.
    pub fn truncate(&self) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(old) = state.file.take() {
            old.sync_all()?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;
        drop(file);

        state.file = Some(open_append(&self.path)?);
        state.next_seq = Some(INITIAL_SEQ);
        state.uncommitted = 0;

        Ok(())
    }

    /// Sync and release the file handle
    ///
    /// Later `log`/`sync` calls fail with `WalClosed`; closing again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(file) = state.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Sequence number the next record will get, `None` once exhausted
    pub fn next_sequence(&self) -> Option<i64> {
        self.state.lock().next_seq
    }

    /// Records written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.state.lock().uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Make sure the next append starts on its own line
///
/// Failing to do so leaves the file as it is; the broken line is skipped
/// on recovery either way.
fn repair_tail(file: &mut File, tail: Tail, path: &Path) {
    if let Err(err) = fix_tail(file, tail) {
        warn!(path = %path.display(), error = %err, "could not repair WAL tail");
    }
}

fn fix_tail(file: &mut File, tail: Tail) -> std::io::Result<()> {
    match tail {
        Tail::Clean => return Ok(()),
        Tail::Unterminated => {
            warn!("WAL ends without a record separator, terminating last record");
            file.write_all(b"\n")?;
        }
        Tail::Torn { offset } => {
            warn!(offset, "WAL ends with a torn record, cutting it off");
            file.set_len(offset)?;
        }
    }
    file.sync_all()
}
