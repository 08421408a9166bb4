//! B-Tree Index Module
//!
//! In-memory order-4 B-tree (2-3-4 tree) mapping hashed keys to values.
//!
//! ## Responsibilities
//! - O(log n) point lookup and insert
//! - Node splitting on overflow; height grows only at the root
//! - Structural verification and a debug rendering
//!
//! ## Ownership
//! Every node owns its children through `Option<Box<Node>>` and the tree
//! owns the root. There are no parent links, so no arena is needed.
//! Values are `Arc<str>`: splits move handles around, never the payload.

mod node;
mod tree;

use std::sync::Arc;

pub use node::{Entry, Node};
pub use tree::BTree;

/// Index key: the hash of the string key
pub type Key = i64;

/// Shared, immutable value payload
pub type Value = Arc<str>;

/// Tree order
pub const ORDER: usize = 4;

/// Key slots per node
pub const MAX_KEYS: usize = ORDER - 1;

/// Child links per node
pub const MAX_CHILDREN: usize = ORDER;
