//! Persistent snapshot storage seam.
//!
//! This crate has no chain database of its own; `SnapshotDb` is the minimal
//! key/value seam the snapshot store needs, for a host node to wire up to
//! whatever store it already has.

use super::error::Error;

/// `"bor-" || hash` as a string key over an opaque byte value (this crate
/// JSON-serializes `Snapshot` into it).
pub trait SnapshotDb: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;
}

/// Builds the persisted-state key for a snapshot at `hash`.
pub fn snapshot_key(hash: &alloy_primitives::B256) -> String {
    format!("bor-{hash:x}")
}
