//! In-memory fakes for the external collaborator traits, used by unit tests
//! in this module tree and by the integration tests under `tests/`.
//!
//! Gated behind the `test-utils` feature so downstream crates can pull these
//! in for their own tests without shipping them in release builds.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;

use super::coordinator::{Coordinator, HeaderReader, SystemCaller};
use super::db::SnapshotDb;
use super::error::Error;
use super::types::{BlockNumber, EventRecord, HeimdallSpan, Header};

#[derive(Default)]
pub struct MemSnapshotDb {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemSnapshotDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotDb for MemSnapshotDb {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.inner.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemHeaderReader {
    by_number: Mutex<HashMap<BlockNumber, Header>>,
    by_hash: Mutex<HashMap<B256, Header>>,
}

impl MemHeaderReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, header: Header) {
        let hash = header.hash_slow();
        self.by_number.lock().unwrap().insert(header.number, header.clone());
        self.by_hash.lock().unwrap().insert(hash, header);
    }
}

impl HeaderReader for MemHeaderReader {
    fn header_by_hash(&self, hash: &B256) -> Option<Header> {
        self.by_hash.lock().unwrap().get(hash).cloned()
    }

    fn header_by_number(&self, number: BlockNumber) -> Option<Header> {
        self.by_number.lock().unwrap().get(&number).cloned()
    }
}

/// A coordinator double that serves canned spans and event records.
#[derive(Default)]
pub struct MockCoordinator {
    pub spans: Mutex<HashMap<u64, HeimdallSpan>>,
    pub events: Mutex<Vec<EventRecord>>,
    pub closed: Mutex<bool>,
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_span(self, span: HeimdallSpan) -> Self {
        self.spans.lock().unwrap().insert(span.span.id, span);
        self
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn span(&self, id: u64) -> Result<HeimdallSpan, Error> {
        self.spans
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::MalformedRecord(format!("no span {id}")))
    }

    async fn state_sync_events(&self, from_id: u64, to_time: u64) -> Result<Vec<EventRecord>, Error> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.id >= from_id && e.time < to_time)
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<(), Error> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// A system-caller double backed by an in-memory `last_state_id` and a log
/// of applied calls.
#[derive(Default)]
pub struct MockSystemCaller {
    pub last_state_id: Mutex<u64>,
    pub applied: Mutex<Vec<(Address, Bytes)>>,
}

impl MockSystemCaller {
    pub fn new(last_state_id: u64) -> Self {
        Self { last_state_id: Mutex::new(last_state_id), applied: Mutex::new(Vec::new()) }
    }
}

impl SystemCaller for MockSystemCaller {
    fn last_state_id(&self) -> Result<u64, Error> {
        Ok(*self.last_state_id.lock().unwrap())
    }

    fn call_system(&self, to: Address, data: Bytes) -> Result<Bytes, Error> {
        self.applied.lock().unwrap().push((to, data));
        // The real state-receiver contract advances its own `last_state_id`
        // as a side effect of a successful `commitState` call; each commit
        // here is always for exactly the next unseen id, so mirror that by
        // incrementing by one per call.
        *self.last_state_id.lock().unwrap() += 1;
        Ok(Bytes::new())
    }
}
