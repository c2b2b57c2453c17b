//! Ordered ingestion of coordinator-issued event records into chain state.

use alloy_rlp::Encodable;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::coordinator::{with_retry, Coordinator, SystemCaller};
use super::constants::STATE_FETCH_LIMIT;
use super::error::Error;
use super::types::{EventRecord, StateSyncData};

/// Commits every pending state-sync event up to `to_time` (the timestamp of
/// the sprint-start header minus one sprint), in ascending `id` order.
pub async fn commit_state_sync_events(
    cfg: &Config,
    coordinator: &dyn Coordinator,
    caller: &dyn SystemCaller,
    block_number: u64,
    to_time: u64,
    cancel: &CancellationToken,
) -> Result<Vec<StateSyncData>, Error> {
    let mut last_state_id = caller.last_state_id()?;

    let mut records = Vec::new();
    let mut from_id = last_state_id + 1;
    loop {
        let page = with_retry(cancel, || coordinator.state_sync_events(from_id, to_time)).await?;
        if page.is_empty() {
            break;
        }
        let page_len = page.len() as u64;
        records.extend(page);
        from_id += page_len;
        if page_len < STATE_FETCH_LIMIT {
            break;
        }
    }
    records.sort_by_key(|r| r.id);

    if let Some(&cap) = cfg.override_state_sync_records.get(&block_number) {
        records.truncate(cap);
    }

    // Built with exact capacity and only the records actually committed --
    // no pre-sized placeholder slice (see DESIGN.md's stateSyncs note).
    let mut committed = Vec::with_capacity(records.len());

    for record in records {
        if record.id <= last_state_id {
            continue;
        }
        // A validation failure breaks the loop but does not unwind what
        // already committed -- the block is not rolled back.
        if let Err(err) = validate_record(cfg, &record, last_state_id, to_time) {
            tracing::warn!(id = record.id, %err, "state-sync record failed validation, stopping commit loop");
            break;
        }

        let calldata = encode_commit_state_calldata(&record);
        if let Err(err) = caller.call_system(cfg.state_receiver_contract_address, calldata.clone().into()) {
            tracing::warn!(id = record.id, %err, "system call for state-sync record failed");
        }

        committed.push(StateSyncData {
            id: record.id,
            contract: record.contract,
            data: calldata.into(),
            tx_hash: record.tx_hash,
        });
        last_state_id = record.id;
    }

    Ok(committed)
}

fn validate_record(cfg: &Config, record: &EventRecord, last_state_id: u64, to_time: u64) -> Result<(), Error> {
    if record.id != last_state_id + 1 {
        return Err(Error::InvalidStateReceived(format!(
            "expected id {}, got {}",
            last_state_id + 1,
            record.id
        )));
    }
    if record.chain_id != cfg.chain_id {
        return Err(Error::InvalidStateReceived(format!(
            "chain id mismatch: expected {}, got {}",
            cfg.chain_id, record.chain_id
        )));
    }
    if record.time >= to_time {
        return Err(Error::InvalidStateReceived(format!(
            "record time {} is not before cutoff {}",
            record.time, to_time
        )));
    }
    Ok(())
}

/// RLP-encodes the record as the `commitState(bytes)` calldata payload.
fn encode_commit_state_calldata(record: &EventRecord) -> Vec<u8> {
    let mut out = Vec::new();
    record.data.encode(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::bor::test_support::{MockCoordinator, MockSystemCaller};
    use alloy_primitives::Address;

    fn cfg() -> Config {
        Config {
            sprint_schedule: Default::default(),
            period_schedule: Default::default(),
            producer_delay_schedule: Default::default(),
            backup_multiplier_schedule: Default::default(),
            jaipur_block: None,
            block_alloc: Default::default(),
            apply_balance_overrides: false,
            validator_contract_address: Address::ZERO,
            state_receiver_contract_address: Address::repeat_byte(1),
            chain_id: "1".into(),
            override_state_sync_records: Default::default(),
        }
    }

    fn record(id: u64, time: u64) -> EventRecord {
        EventRecord {
            id,
            contract: Address::ZERO,
            data: Default::default(),
            tx_hash: Default::default(),
            chain_id: "1".into(),
            time,
        }
    }

    #[tokio::test]
    async fn commits_only_unseen_records_in_ascending_order() {
        let coordinator = MockCoordinator::new();
        *coordinator.events.lock().unwrap() = vec![record(1, 10), record(2, 20), record(3, 30)];
        let caller = MockSystemCaller::new(0);

        let committed = commit_state_sync_events(&cfg(), &coordinator, &caller, 100, 100, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(committed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(*caller.last_state_id.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn re_entry_is_idempotent_once_last_state_id_advances() {
        let coordinator = MockCoordinator::new();
        *coordinator.events.lock().unwrap() = vec![record(1, 10), record(2, 20)];
        let caller = MockSystemCaller::new(1);

        let committed = commit_state_sync_events(&cfg(), &coordinator, &caller, 100, 100, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(committed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }
}
