//! Tests for the WAL handle
//!
//! These tests verify:
//! - Sequence numbers: assignment, recovery on open, reset on truncate
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Torn tail repair on open
//! - Close semantics
//! - Concurrent loggers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use kdb::config::WalSyncStrategy;
use kdb::wal::{Operation, Wal, WalReader};
use kdb::KdbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn append_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

fn read_all(path: &PathBuf) -> Vec<kdb::wal::WalEntry> {
    let reader = WalReader::open(path).unwrap();
    reader.entries().collect::<Result<Vec<_>, _>>().unwrap()
}

// =============================================================================
// Sequence Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let (_temp, wal_path) = setup_temp_wal();

    let wal = Wal::open(&wal_path).unwrap();

    assert!(wal_path.exists());
    assert_eq!(wal.next_sequence(), Some(1));
    assert_eq!(wal.path(), wal_path.as_path());
}

#[test]
fn test_log_assigns_sequential_numbers() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    let seq1 = wal.log(Operation::Put, "a", "1").unwrap();
    let seq2 = wal.log(Operation::Put, "b", "2").unwrap();
    let seq3 = wal.log(Operation::Delete, "a", "").unwrap();

    assert_eq!((seq1, seq2, seq3), (1, 2, 3));
    assert_eq!(wal.next_sequence(), Some(4));
}

#[test]
fn test_reopen_continues_sequence() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let wal = Wal::open(&wal_path).unwrap();
        wal.log(Operation::Put, "a", "1").unwrap();
        wal.log(Operation::Put, "b", "2").unwrap();
        wal.close().unwrap();
    }

    let wal = Wal::open(&wal_path).unwrap();
    assert_eq!(wal.next_sequence(), Some(3));
    assert_eq!(wal.log(Operation::Put, "c", "3").unwrap(), 3);
}

#[test]
fn test_reopen_uses_max_sequence() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        b"{\"seq\":5,\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}\n\
          {\"seq\":3,\"op\":\"PUT\",\"key\":\"b\",\"value\":\"2\",\"timestamp\":2}\n",
    );

    let wal = Wal::open(&wal_path).unwrap();

    assert_eq!(wal.next_sequence(), Some(6));
}

#[test]
fn test_open_skips_malformed_lines() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        b"not json\n{\"seq\":2,\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}\n{broken\n",
    );

    let wal = Wal::open(&wal_path).unwrap();

    assert_eq!(wal.next_sequence(), Some(3));
}

#[test]
fn test_open_with_negative_sequences_starts_at_one() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        b"{\"seq\":-7,\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}\n",
    );

    let wal = Wal::open(&wal_path).unwrap();

    assert_eq!(wal.next_sequence(), Some(1));
    assert_eq!(wal.log(Operation::Put, "b", "2").unwrap(), 1);
}

#[test]
fn test_open_at_max_sequence_does_not_overflow() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        format!(
            "{{\"seq\":{},\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}}\n",
            i64::MAX
        )
        .as_bytes(),
    );
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let wal = Wal::open(&wal_path).unwrap();
    assert_eq!(wal.next_sequence(), None);

    // no number is left, so nothing may be appended
    assert!(matches!(
        wal.log(Operation::Put, "b", "2"),
        Err(KdbError::SequenceExhausted)
    ));
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);

    // truncation hands out numbers again
    wal.truncate().unwrap();
    assert_eq!(wal.log(Operation::Put, "b", "2").unwrap(), 1);
}

#[test]
fn test_open_treats_out_of_range_sequence_as_malformed() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        b"{\"seq\":18446744073709551615,\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}\n",
    );

    let wal = Wal::open(&wal_path).unwrap();

    assert_eq!(wal.next_sequence(), Some(1));
    assert!(read_all(&wal_path).is_empty());
}

#[test]
fn test_open_directory_fails() {
    let temp_dir = TempDir::new().unwrap();

    let result = Wal::open(temp_dir.path());

    assert!(matches!(result, Err(KdbError::Io(_))));
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open_with(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    wal.log(Operation::Put, "k1", "v1").unwrap();
    assert_eq!(wal.uncommitted_count(), 0);

    wal.log(Operation::Put, "k2", "v2").unwrap();
    assert_eq!(wal.uncommitted_count(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open_with(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    wal.log(Operation::Put, "k1", "v").unwrap();
    wal.log(Operation::Put, "k2", "v").unwrap();
    assert_eq!(wal.uncommitted_count(), 2);

    // 3rd entry triggers sync
    wal.log(Operation::Put, "k3", "v").unwrap();
    assert_eq!(wal.uncommitted_count(), 0);

    wal.log(Operation::Put, "k4", "v").unwrap();
    assert_eq!(wal.uncommitted_count(), 1);
}

#[test]
fn test_manual_sync() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open_with(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    for i in 0..10 {
        wal.log(Operation::Put, &format!("k{}", i), "v").unwrap();
    }
    assert_eq!(wal.uncommitted_count(), 10);

    wal.sync().unwrap();
    assert_eq!(wal.uncommitted_count(), 0);
}

#[test]
fn test_unsynced_records_are_readable() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open_with(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    wal.log(Operation::Put, "k1", "v1").unwrap();
    wal.log(Operation::Put, "k2", "v2").unwrap();

    assert_eq!(wal.recover().unwrap().len(), 2);
}

// =============================================================================
// Recover Tests
// =============================================================================

#[test]
fn test_recover_returns_records_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    wal.log(Operation::Put, "a", "1").unwrap();
    wal.log(Operation::Delete, "a", "").unwrap();
    wal.log(Operation::Put, "b", "2").unwrap();

    let entries = wal.recover().unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(entries[1].operation, Operation::Delete);
    assert_eq!(entries[2].key, "b");
    assert_eq!(entries[2].value, "2");
}

#[test]
fn test_recover_after_file_removed_is_empty() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();
    wal.log(Operation::Put, "a", "1").unwrap();

    fs::remove_file(&wal_path).unwrap();

    assert!(wal.recover().unwrap().is_empty());
}

// =============================================================================
// Truncate Tests
// =============================================================================

#[test]
fn test_truncate_resets_sequence() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    wal.log(Operation::Put, "k1", "v1").unwrap();
    wal.log(Operation::Put, "k2", "v2").unwrap();
    assert_eq!(wal.next_sequence(), Some(3));

    wal.truncate().unwrap();
    assert_eq!(wal.next_sequence(), Some(1));
    assert_eq!(wal.uncommitted_count(), 0);

    assert_eq!(wal.log(Operation::Put, "k3", "v3").unwrap(), 1);
}

#[test]
fn test_truncate_clears_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    wal.log(Operation::Put, "k1", "v1").unwrap();
    wal.truncate().unwrap();

    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    assert!(wal.recover().unwrap().is_empty());
}

#[test]
fn test_truncate_then_write() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let wal = Wal::open(&wal_path).unwrap();
        wal.log(Operation::Put, "old", "data").unwrap();
        wal.log(Operation::Put, "older", "data").unwrap();
        wal.truncate().unwrap();
        wal.log(Operation::Put, "new", "data").unwrap();
    }

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[0].key, "new");
}

#[test]
fn test_truncate_after_close_reopens() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    wal.log(Operation::Put, "a", "1").unwrap();
    wal.close().unwrap();
    wal.truncate().unwrap();

    assert_eq!(wal.log(Operation::Put, "b", "2").unwrap(), 1);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_open_cuts_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let wal = Wal::open(&wal_path).unwrap();
        wal.log(Operation::Put, "a", "1").unwrap();
    }
    let clean_len = fs::metadata(&wal_path).unwrap().len();
    append_raw(&wal_path, b"{\"seq\":2,\"op\":\"PU");

    let wal = Wal::open(&wal_path).unwrap();
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);
    assert_eq!(wal.next_sequence(), Some(2));

    wal.log(Operation::Put, "b", "2").unwrap();

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].key, "b");
}

#[test]
fn test_open_terminates_unterminated_record() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(
        &wal_path,
        b"{\"seq\":1,\"op\":\"PUT\",\"key\":\"a\",\"value\":\"1\",\"timestamp\":1}",
    );

    let wal = Wal::open(&wal_path).unwrap();
    wal.log(Operation::Put, "b", "2").unwrap();

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "a");
    assert_eq!(entries[1].seq, 2);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_log_after_close_fails() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();
    wal.log(Operation::Put, "a", "1").unwrap();

    wal.close().unwrap();

    assert!(matches!(wal.log(Operation::Put, "b", "2"), Err(KdbError::WalClosed)));
    assert!(matches!(wal.sync(), Err(KdbError::WalClosed)));
    // failed log does not consume a sequence number
    assert_eq!(wal.next_sequence(), Some(2));
}

#[test]
fn test_close_twice_is_noop() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Wal::open(&wal_path).unwrap();

    wal.close().unwrap();
    wal.close().unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_loggers_get_unique_sequences() {
    let (_temp, wal_path) = setup_temp_wal();
    let wal = Arc::new(Wal::open_with(&wal_path, WalSyncStrategy::EveryNEntries { count: 50 }).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                (0..25)
                    .map(|i| wal.log(Operation::Put, &format!("t{}-k{}", t, i), "v").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seqs: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=100).collect::<Vec<_>>());

    wal.sync().unwrap();
    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 100);
    // file order is sequence order
    assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
}
