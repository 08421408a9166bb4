//! Engine Module
//!
//! The store that coordinates the WAL and the B-tree index.
//!
//! ## Responsibilities
//! - Reject duplicate keys before anything is logged
//! - Log every mutation to the WAL before applying it to the tree
//! - Rebuild the tree from the WAL on startup
//! - Checkpoint (truncate) the WAL on request

use std::path::Path;

use tracing::{debug, info, warn};

use crate::btree::{BTree, Value};
use crate::config::Config;
use crate::error::{KdbError, Result};
use crate::hash::hash_key;
use crate::wal::{Operation, Wal, WalEntry};

/// Outcome of `Store::put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// Logged (when a WAL is attached) and inserted
    Inserted(Value),

    /// The key already exists; the first writer wins and nothing changed
    Duplicate(Value),
}

impl PutOutcome {
    /// Whether the put took effect
    pub fn committed(&self) -> bool {
        matches!(self, PutOutcome::Inserted(_))
    }

    /// The value passed to `put`
    pub fn value(&self) -> &Value {
        match self {
            PutOutcome::Inserted(value) | PutOutcome::Duplicate(value) => value,
        }
    }
}

/// The key-value store
///
/// ## Concurrency Model
///
/// Mutations take `&mut self`, so the duplicate check, the WAL append and
/// the tree insert in `put` form one exclusive section. Callers sharing a
/// store across threads wrap it in a lock; the WAL has its own mutex and
/// stays atomic per record either way.
pub struct Store {
    /// Store configuration
    config: Config,

    /// In-memory index, rebuilt from the WAL on every open
    tree: BTree,

    /// Write-ahead log (`None` for in-memory stores)
    wal: Option<Wal>,
}

impl Store {
    /// Open a store as described by `config`
    ///
    /// With a WAL path this opens (or creates) the log and replays it;
    /// without one the store starts empty and in memory.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let Some(wal_path) = config.wal_path.clone() else {
            return Ok(Self::with_config(config));
        };

        // Step 1: Open the WAL (picks up the next sequence number)
        let wal = Wal::open_with(&wal_path, config.wal_sync_strategy)?;

        // Step 2: Read back every durable record
        let entries = wal.recover()?;

        // Step 3: Replay into a fresh tree. The WAL is attached afterwards
        // so replayed records are not logged a second time.
        let mut store = Self::with_config(config);
        store.replay(entries);
        store.wal = Some(wal);

        info!(path = %wal_path.display(), keys = store.len(), "store opened");
        Ok(store)
    }

    /// Open or create a WAL-backed store at `path`
    pub fn open_with_wal(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::builder().wal_path(path.as_ref()).build())
    }

    /// Create an empty store with no WAL
    ///
    /// Nothing is durable and `put` never fails on I/O.
    pub fn open_in_memory() -> Self {
        Self::with_config(Config::builder().in_memory().build())
    }

    fn with_config(config: Config) -> Self {
        Self {
            config,
            tree: BTree::new(),
            wal: None,
        }
    }

    fn replay(&mut self, entries: Vec<WalEntry>) {
        let total = entries.len();
        let mut applied = 0usize;

        for entry in entries {
            match entry.operation {
                Operation::Put => {
                    if self.apply_put(&entry.key, Value::from(entry.value)) {
                        applied += 1;
                    } else {
                        debug!(seq = entry.seq, key = %entry.key, "replay skipped duplicate key");
                    }
                }
                Operation::Delete => {
                    debug!(seq = entry.seq, key = %entry.key, "replay ignores DELETE, deletion is unsupported");
                }
                Operation::Unknown => {
                    debug!(seq = entry.seq, "replay ignores unknown operation");
                }
            }
        }

        info!(records = total, applied, "WAL replay complete");
    }

    /// Insert unless the key exists; returns whether it was inserted
    fn apply_put(&mut self, key: &str, value: Value) -> bool {
        let hash = hash_key(key);
        if self.tree.search(hash).is_some() {
            return false;
        }
        self.tree.insert(hash, value);
        true
    }

    /// Store `value` under `key` if the key is new
    ///
    /// An existing key is left untouched and reported as `Duplicate`.
    /// Otherwise the PUT is logged first; if logging fails the error is
    /// returned and the tree is not modified. Either way nothing was
    /// committed: callers treat `Ok(Duplicate(_))` and `Err(_)` alike when
    /// they only care whether the value is stored.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> Result<PutOutcome> {
        let value = value.into();
        let hash = hash_key(key);

        if self.tree.search(hash).is_some() {
            debug!(key, "put rejected, key exists");
            return Ok(PutOutcome::Duplicate(value));
        }

        if let Some(wal) = &self.wal {
            wal.log(Operation::Put, key, &value)?;
        }

        self.tree.insert(hash, Value::clone(&value));
        Ok(PutOutcome::Inserted(value))
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<Value> {
        self.tree.get(hash_key(key)).cloned()
    }

    /// Delete a key
    ///
    /// The index has no removal, so this always fails with `Unsupported`
    /// and nothing is logged.
    pub fn delete(&mut self, _key: &str) -> Result<()> {
        Err(KdbError::Unsupported("delete"))
    }

    /// Truncate the WAL
    ///
    /// No snapshot is written first: afterwards the in-memory tree is the
    /// only copy of every key stored so far, and a crash before new writes
    /// loses all of them.
    pub fn checkpoint(&mut self) -> Result<()> {
        if let Some(wal) = &self.wal {
            warn!(
                path = %wal.path().display(),
                keys = self.tree.len(),
                "checkpoint discards WAL history without a snapshot"
            );
            wal.truncate()?;
        }
        Ok(())
    }

    /// Close the store, syncing and releasing the WAL
    pub fn close(self) -> Result<()> {
        if let Some(wal) = &self.wal {
            wal.close()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of keys
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The index
    pub fn tree(&self) -> &BTree {
        &self.tree
    }

    /// Pretty-printed tree
    pub fn render_tree(&self) -> String {
        self.tree.render()
    }

    /// The WAL, if attached
    pub fn wal(&self) -> Option<&Wal> {
        self.wal.as_ref()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
