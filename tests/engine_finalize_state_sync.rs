//! Drives the engine façade's `finalize` entry point across sprint-boundary
//! and off-boundary blocks, exercising the state-sync commit loop end to end.

use std::sync::Arc;

use alloy_consensus::Header as ConsensusHeader;
use alloy_primitives::{Address, Bytes, U256};
use bor_consensus::consensus::bor::config::Config;
use bor_consensus::consensus::bor::coordinator::HeaderReader;
use bor_consensus::consensus::bor::engine::Engine;
use bor_consensus::consensus::bor::genesis_alloc::AccountWriter;
use bor_consensus::consensus::bor::test_support::{MemHeaderReader, MemSnapshotDb, MockCoordinator, MockSystemCaller};
use bor_consensus::consensus::bor::types::EventRecord;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct NullWriter;

impl AccountWriter for NullWriter {
    fn set_code(&mut self, _address: Address, _code: Bytes) {}
    fn set_balance(&mut self, _address: Address, _balance: U256) {}
}

fn config() -> Config {
    Config {
        sprint_schedule: [(0, 10)].into_iter().collect(),
        period_schedule: [(0, 0)].into_iter().collect(),
        producer_delay_schedule: [(0, 0)].into_iter().collect(),
        backup_multiplier_schedule: [(0, 0)].into_iter().collect(),
        jaipur_block: None,
        block_alloc: Default::default(),
        apply_balance_overrides: false,
        validator_contract_address: Address::ZERO,
        state_receiver_contract_address: Address::repeat_byte(9),
        chain_id: "1".into(),
        override_state_sync_records: Default::default(),
    }
}

fn event(id: u64, time: u64) -> EventRecord {
    EventRecord { id, contract: Address::ZERO, data: Default::default(), tx_hash: Default::default(), chain_id: "1".into(), time }
}

#[tokio::test]
async fn finalize_commits_events_only_on_sprint_boundary_blocks() {
    let headers = Arc::new(MemHeaderReader::new());
    headers.insert(ConsensusHeader { number: 0, timestamp: 50, ..Default::default() });

    let coordinator = Arc::new(MockCoordinator::new());
    *coordinator.events.lock().unwrap() = vec![event(1, 10), event(2, 20)];

    let db = Arc::new(MemSnapshotDb::new());
    let engine = Engine::new(config(), db, headers.clone(), coordinator.clone(), 255, 6400);

    let caller = MockSystemCaller::new(0);
    let mut writer = NullWriter;

    let cancel = CancellationToken::new();

    // Block 5 does not sit on a sprint boundary (sprint length 10): nothing commits.
    let off_boundary = ConsensusHeader { number: 5, timestamp: 60, ..Default::default() };
    let committed = engine.finalize(&off_boundary, &caller, &mut writer, &cancel).await.unwrap();
    assert!(committed.is_empty());
    assert_eq!(*caller.last_state_id.lock().unwrap(), 0);

    // Block 10 is the sprint boundary: both pending records commit in order.
    let boundary = ConsensusHeader { number: 10, timestamp: 100, ..Default::default() };
    let committed = engine.finalize(&boundary, &caller, &mut writer, &cancel).await.unwrap();
    assert_eq!(committed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(*caller.last_state_id.lock().unwrap(), 2);

    // Re-finalizing the same boundary is a no-op: the coordinator has nothing
    // left with id > last_state_id.
    let committed_again = engine.finalize(&boundary, &caller, &mut writer, &cancel).await.unwrap();
    assert!(committed_again.is_empty());
}

#[tokio::test]
async fn close_is_idempotent_and_subsequent_span_lookups_return_shutdown() {
    let headers: Arc<dyn HeaderReader> = Arc::new(MemHeaderReader::new());
    let coordinator = Arc::new(MockCoordinator::new());
    let db = Arc::new(MemSnapshotDb::new());
    let engine = Engine::new(config(), db, headers, coordinator, 255, 6400);

    engine.close().await.unwrap();
    engine.close().await.unwrap();

    let err = engine.span_by_id(0, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, bor_consensus::consensus::bor::error::Error::Shutdown));
}
