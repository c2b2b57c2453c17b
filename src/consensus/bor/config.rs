//! Chain-wide parameters for the Bor engine, deserialized from the chain's
//! genesis configuration.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::types::GenesisAllocOverride;

/// A step function of block number: `{"0": a, "100": b}` means `a` applies
/// from block 0 and `b` takes over at block 100.
pub type StepSchedule = BTreeMap<u64, u64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sprint_schedule: StepSchedule,
    pub period_schedule: StepSchedule,
    pub producer_delay_schedule: StepSchedule,
    pub backup_multiplier_schedule: StepSchedule,

    /// Block number at which the base-fee seal-hash fix activates. `None` means never.
    pub jaipur_block: Option<u64>,

    /// Keyed by decimal-stringified block number.
    pub block_alloc: BTreeMap<String, BTreeMap<Address, GenesisAllocOverride>>,
    /// See `DESIGN.md`'s Open Question decision: code is always overwritten;
    /// balance only when this is set.
    pub apply_balance_overrides: bool,

    pub validator_contract_address: Address,
    pub state_receiver_contract_address: Address,
    pub chain_id: String,

    /// Test/fork patch: caps the number of state-sync records committed at
    /// a given block, keyed by block number.
    #[serde(default)]
    pub override_state_sync_records: BTreeMap<u64, usize>,
}

impl Config {
    /// Looks up the value of a step schedule active at `number`: the entry
    /// with the greatest key `<= number`, defaulting to the entry at `0`.
    pub fn step_at(schedule: &StepSchedule, number: u64) -> u64 {
        schedule
            .range(..=number)
            .next_back()
            .map(|(_, v)| *v)
            .or_else(|| schedule.get(&0).copied())
            .unwrap_or(0)
    }

    pub fn sprint_at(&self, number: u64) -> u64 {
        Self::step_at(&self.sprint_schedule, number).max(1)
    }

    pub fn period_at(&self, number: u64) -> u64 {
        Self::step_at(&self.period_schedule, number)
    }

    pub fn producer_delay_at(&self, number: u64) -> u64 {
        Self::step_at(&self.producer_delay_schedule, number)
    }

    pub fn backup_multiplier_at(&self, number: u64) -> u64 {
        Self::step_at(&self.backup_multiplier_schedule, number)
    }

    /// `true` when the Jaipur base-fee seal-hash fix is active at `number`.
    pub fn is_jaipur_active(&self, number: u64) -> bool {
        self.jaipur_block.is_some_and(|b| number >= b)
    }
}
