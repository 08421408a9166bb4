//! # kdb
//!
//! An embedded key-value store with:
//! - An in-memory order-4 B-tree index over hashed string keys
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery that skips torn and malformed records
//! - First-writer-wins puts
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │        put: duplicate check → WAL append → tree insert       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │   B-Tree    │
//!   │ (JSON lines)│          │ (2-3-4, RAM)│
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! On open the tree is rebuilt by replaying the WAL; no tree format is
//! ever written to disk.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod hash;
pub mod wal;
pub mod btree;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KdbError, Result};
pub use config::{Config, WalSyncStrategy};
pub use hash::hash_key;
pub use btree::{BTree, Key, Value};
pub use wal::Wal;
pub use engine::{PutOutcome, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
