//! Engine façade composing the snapshot engine, verifier, sealer, span
//! store, and state-sync commit loop behind the call sites a real node
//! needs: `verify_header` (import path), `seal` (production path), and
//! `finalize` (sprint-boundary bookkeeping). It additionally owns the
//! authorized-signer cell and the coordinator/header-reader handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::coordinator::{Coordinator, HeaderReader, SystemCaller};
use super::db::SnapshotDb;
use super::error::Error;
use super::genesis_alloc::{AccountWriter, GenesisAllocPatcher};
use super::sealer::Sealer;
use super::signer::{SignFn, SignerCell};
use super::snapshot::Snapshot;
use super::snapshot_store::SnapshotStore;
use super::span::SpanStore;
use super::state_sync::commit_state_sync_events;
use super::types::{HeimdallSpan, Header, StateSyncData};
use super::verifier::{verify_cascading, verify_standalone};

/// Composes C1-C8 behind the node-facing verify/seal/finalize entry points.
///
/// Shutdown is a once-guard ([`close`](Engine::close)): once closed, every
/// entry point returns [`Error::Shutdown`] instead of touching the
/// coordinator or blocking.
pub struct Engine<DB> {
    cfg: Config,
    signer: Arc<SignerCell>,
    snapshots: Arc<SnapshotStore<DB>>,
    sealer: Sealer<DB>,
    spans: SpanStore,
    coordinator: Arc<dyn Coordinator>,
    headers: Arc<dyn HeaderReader>,
    closed: AtomicBool,
}

impl<DB: SnapshotDb> Engine<DB> {
    pub fn new(
        cfg: Config,
        db: Arc<DB>,
        headers: Arc<dyn HeaderReader>,
        coordinator: Arc<dyn Coordinator>,
        zeroth_span_end: u64,
        default_span_length: u64,
    ) -> Self {
        let signer = Arc::new(SignerCell::new());
        let snapshots = Arc::new(SnapshotStore::new(db, headers.clone()));
        let sealer = Sealer::new(cfg.clone(), signer.clone(), snapshots.clone());
        let spans = SpanStore::new(coordinator.clone(), zeroth_span_end, default_span_length);
        Self { cfg, signer, snapshots, sealer, spans, coordinator, headers, closed: AtomicBool::new(false) }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Seeds the snapshot store with the genesis snapshot, bypassing
    /// reconstruction for block 0.
    pub fn seed_genesis(&self, snapshot: Snapshot) {
        self.snapshots.seed(snapshot);
    }

    /// Publishes (or clears, with `None`) the node's authorized signer.
    /// Readers (the sealer) observe this atomically with no blocking.
    pub fn authorize(&self, signer: Option<(Address, Arc<dyn SignFn>)>) {
        match signer {
            Some((address, sign_fn)) => self.signer.set(address, sign_fn),
            None => self.signer.clear(),
        }
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Shutdown);
        }
        Ok(())
    }

    /// Runs the standalone and, where a parent is available, the cascading
    /// header checks, reconstructing the parent's snapshot on demand.
    pub fn verify_header(&self, header: &Header, parent: Option<&Header>, now: u64) -> Result<(), Error> {
        self.check_open()?;
        verify_standalone(header, &self.cfg, now)?;
        let Some(parent) = parent else { return Ok(()) };
        let snapshot = self.snapshots.snapshot(&self.cfg, parent.number, parent.hash_slow())?;
        verify_cascading(header, parent, &snapshot, &self.cfg, self.snapshots.sig_cache())
    }

    /// The snapshot valid after `(number, hash)`, reconstructing via a
    /// backward header walk if neither the LRU nor the backing store has it.
    pub fn snapshot(&self, number: u64, hash: alloy_primitives::B256) -> Result<Snapshot, Error> {
        self.check_open()?;
        self.snapshots.snapshot(&self.cfg, number, hash)
    }

    /// Signs `header` on behalf of the authorized signer and schedules its
    /// delivery.
    pub fn seal(
        &self,
        header: Header,
        parent: &Header,
        parent_hash: alloy_primitives::B256,
        has_transactions: bool,
        cancel: CancellationToken,
        results: mpsc::Sender<Header>,
    ) -> Result<(), Error> {
        self.check_open()?;
        self.sealer.seal(header, parent, parent_hash, has_transactions, cancel, results)
    }

    pub async fn span_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<HeimdallSpan, Error> {
        self.check_open()?;
        self.spans.span_by_id(id, cancel).await
    }

    pub async fn span_by_block(&self, block: u64, cancel: &CancellationToken) -> Result<HeimdallSpan, Error> {
        self.check_open()?;
        self.spans.span_by_block(block, cancel).await
    }

    /// Sprint-boundary bookkeeping run at finalize time: the genesis-alloc
    /// patch (any block number) followed by the state-sync commit loop
    /// (sprint-start blocks only).
    pub async fn finalize(
        &self,
        header: &Header,
        caller: &dyn SystemCaller,
        writer: &mut impl AccountWriter,
        cancel: &CancellationToken,
    ) -> Result<Vec<StateSyncData>, Error> {
        self.check_open()?;
        GenesisAllocPatcher::new(&self.cfg).apply(header.number, writer);

        let sprint = self.cfg.sprint_at(header.number);
        if header.number == 0 || sprint == 0 || header.number % sprint != 0 {
            return Ok(Vec::new());
        }

        let boundary = header.number - sprint;
        let to_time = self.headers.header_by_number(boundary).map(|h| h.timestamp).unwrap_or(header.timestamp);
        commit_state_sync_events(&self.cfg, self.coordinator.as_ref(), caller, header.number, to_time, cancel).await
    }

    /// Idempotent shutdown: the first call closes the coordinator; later
    /// calls are no-ops so a double-close never blocks or errors.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.coordinator.close().await
    }
}
