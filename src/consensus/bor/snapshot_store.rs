//! Caching, checkpointing, and recursive reconstruction over `Snapshot`: a
//! front LRU keyed by hash, checkpoint-interval persistence, and a backward
//! header walk with forward `apply` on a cache miss.

use std::sync::Arc;

use alloy_primitives::B256;
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};

use super::config::Config;
use super::coordinator::HeaderReader;
use super::constants::{CHECKPOINT_INTERVAL, IN_MEMORY_SNAPSHOTS};
use super::db::{snapshot_key, SnapshotDb};
use super::error::Error;
use super::seal::SigCache;
use super::snapshot::Snapshot;
use super::types::Header;

pub struct SnapshotStore<DB> {
    db: Arc<DB>,
    headers: Arc<dyn HeaderReader>,
    sig_cache: SigCache,
    cache: Mutex<LruMap<B256, Snapshot, ByLength>>,
}

impl<DB: SnapshotDb> SnapshotStore<DB> {
    pub fn new(db: Arc<DB>, headers: Arc<dyn HeaderReader>) -> Self {
        Self {
            db,
            headers,
            sig_cache: SigCache::new(),
            cache: Mutex::new(LruMap::new(ByLength::new(IN_MEMORY_SNAPSHOTS))),
        }
    }

    /// Seeds the store with the genesis snapshot, bypassing reconstruction.
    pub fn seed(&self, snapshot: Snapshot) {
        self.insert(snapshot);
    }

    /// The signer-recovery cache shared by every `apply`/reconstruction call
    /// this store makes, exposed so callers (the verifier) reuse it instead
    /// of recovering the same signer twice.
    pub fn sig_cache(&self) -> &SigCache {
        &self.sig_cache
    }

    /// Caller-facing entry point: the snapshot valid *after* the header at
    /// `(number, hash)` has been applied. Tries the LRU, then the persistent
    /// store at checkpoint keys, then reconstructs via a backward header
    /// walk and a forward re-`apply`.
    pub fn snapshot(&self, cfg: &Config, number: u64, hash: B256) -> Result<Snapshot, Error> {
        if let Some(snap) = self.cache.lock().get(&hash) {
            return Ok(snap.clone());
        }

        if let Some(bytes) = self.db.get(&snapshot_key(&hash))? {
            let snap: Snapshot =
                serde_json::from_slice(&bytes).map_err(|e| Error::MalformedRecord(e.to_string()))?;
            self.cache.lock().insert(hash, snap.clone());
            return Ok(snap);
        }

        self.reconstruct(cfg, number, hash)
    }

    fn reconstruct(&self, cfg: &Config, number: u64, hash: B256) -> Result<Snapshot, Error> {
        let mut chain: Vec<Header> = Vec::new();
        let mut cursor_hash = hash;
        let mut cursor_number = number;

        let base = loop {
            if let Some(snap) = self.cache.lock().get(&cursor_hash) {
                break snap.clone();
            }
            if let Some(bytes) = self.db.get(&snapshot_key(&cursor_hash))? {
                let snap: Snapshot =
                    serde_json::from_slice(&bytes).map_err(|e| Error::MalformedRecord(e.to_string()))?;
                self.cache.lock().insert(cursor_hash, snap.clone());
                break snap;
            }

            let header = self
                .headers
                .header_by_hash(&cursor_hash)
                .ok_or(Error::UnknownAncestor(cursor_hash))?;

            if header.number == 0 {
                return Err(Error::UnknownAncestor(cursor_hash));
            }

            chain.push(header.clone());
            cursor_hash = header.parent_hash;
            cursor_number = header.number - 1;
            let _ = cursor_number;
        };

        chain.reverse();
        let mut working = base;
        for header in &chain {
            working = working.apply(cfg, &self.sig_cache, std::slice::from_ref(header))?;
            self.insert(working.clone());
        }
        Ok(working)
    }

    /// Inserts into the LRU, and persists to the backing store every
    /// `CHECKPOINT_INTERVAL` blocks.
    pub fn insert(&self, snapshot: Snapshot) {
        self.cache.lock().insert(snapshot.hash, snapshot.clone());
        if snapshot.number % CHECKPOINT_INTERVAL == 0 {
            if let Ok(bytes) = serde_json::to_vec(&snapshot) {
                if let Err(err) = self.db.put(&snapshot_key(&snapshot.hash), bytes) {
                    tracing::error!(number = snapshot.number, ?err, "failed to persist snapshot checkpoint");
                } else {
                    tracing::debug!(number = snapshot.number, "persisted snapshot checkpoint");
                }
            }
        }
    }
}
