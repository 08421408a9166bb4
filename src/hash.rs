//! Key hashing
//!
//! String keys are indexed by a DJB2 hash. Only the original string is
//! written to the WAL, so the hash is recomputed on every replay.

use crate::btree::Key;

/// DJB2 seed
const SEED: i64 = 5381;

/// Hash a string key to its index key: `h = h * 33 + c` per character,
/// wrapping on overflow.
///
/// Collisions are not detected: two keys with the same hash are treated as
/// the same key by the store.
pub fn hash_key(key: &str) -> Key {
    key.chars().fold(SEED, |hash, c| {
        (hash << 5).wrapping_add(hash).wrapping_add(i64::from(u32::from(c)))
    })
}
