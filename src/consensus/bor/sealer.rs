//! Produces a signed header respecting wiggle delay and turn-ness: fetch the
//! snapshot for the parent, check membership, compute delay, sign, and
//! deliver asynchronously past a cancellation signal.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::constants::EXTRA_SEAL;
use super::db::SnapshotDb;
use super::error::Error;
use super::seal::seal_hash;
use super::signer::SignerCell;
use super::snapshot_store::SnapshotStore;
use super::types::Header;
use super::validator::{difficulty, signer_succession_number};
use super::verifier::producer_delay_for;

/// Signs headers on behalf of the node's authorized signer and schedules
/// their delivery. One `Sealer` instance is shared across seal requests so
/// the in-flight guard can deduplicate concurrent attempts for the same
/// block number.
pub struct Sealer<DB> {
    cfg: Config,
    signer: Arc<SignerCell>,
    snapshots: Arc<SnapshotStore<DB>>,
    in_flight: Mutex<HashSet<u64>>,
}

impl<DB: SnapshotDb> Sealer<DB> {
    pub fn new(cfg: Config, signer: Arc<SignerCell>, snapshots: Arc<SnapshotStore<DB>>) -> Self {
        Self { cfg, signer, snapshots, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Signs `header` and schedules its delivery at `header.timestamp`
    /// (bumped forward to respect turn-ness if needed). `has_transactions`
    /// guards the zero-period empty-block refusal.
    pub fn seal(
        &self,
        mut header: Header,
        parent: &Header,
        parent_hash: B256,
        has_transactions: bool,
        cancel: CancellationToken,
        results: mpsc::Sender<Header>,
    ) -> Result<(), Error> {
        let number = header.number;
        if number == 0 {
            return Err(Error::UnknownBlock);
        }
        if self.cfg.period_at(number) == 0 && !has_transactions {
            return Err(Error::EmptyBlockOnZeroPeriod(number));
        }

        if !self.in_flight.lock().insert(number) {
            return Err(Error::SealingInFlight(number));
        }
        let _guard = InFlightGuard { set: &self.in_flight, number };

        let signer_address = self.signer.address().ok_or(Error::UnauthorizedSigner(Address::ZERO))?;
        let snapshot = self.snapshots.snapshot(&self.cfg, parent.number, parent_hash)?;
        if !snapshot.validator_set.has_address(signer_address) {
            return Err(Error::UnauthorizedSigner(signer_address));
        }

        let succession = signer_succession_number(&snapshot.validator_set, signer_address)?;
        let target_time = parent.timestamp + producer_delay_for(&self.cfg, number, succession);
        if header.timestamp < target_time {
            header.timestamp = target_time;
        }
        header.difficulty = U256::from(difficulty(&snapshot.validator_set, signer_address));

        let hash = seal_hash(&header, &self.cfg)?;
        let signature = self.signer.sign(hash)?;
        write_seal(&mut header, &signature)?;

        schedule_delivery(header, target_time, cancel, results);
        Ok(())
    }
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<u64>>,
    number: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.number);
    }
}

fn write_seal(header: &mut Header, signature: &[u8; 65]) -> Result<(), Error> {
    let mut extra = header.extra_data.to_vec();
    if extra.len() < EXTRA_SEAL {
        return Err(Error::MissingSignature);
    }
    let start = extra.len() - EXTRA_SEAL;
    extra[start..].copy_from_slice(signature);
    header.extra_data = extra.into();
    Ok(())
}

/// Sleeps until `target_time` (wall-clock seconds), dropping the block on
/// cancellation, and warns rather than panics if delivery finds no receiver.
fn schedule_delivery(header: Header, target_time: u64, cancel: CancellationToken, results: mpsc::Sender<Header>) {
    tokio::spawn(async move {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let deadline = Instant::now() + Duration::from_secs(target_time.saturating_sub(now));

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(number = header.number, "seal delivery cancelled");
            }
            _ = tokio::time::sleep_until(deadline) => {
                let number = header.number;
                if results.try_send(header).is_err() {
                    tracing::warn!(number, "no receiver ready for sealed block, dropping");
                }
            }
        }
    });
}
