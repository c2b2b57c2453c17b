//! Wire/data-model types shared across the engine's components.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Re-exported so callers don't need to depend on `alloy-consensus` directly.
pub use alloy_consensus::Header;

pub type BlockNumber = u64;

/// A coordinator-assigned block range over which a validator set is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub id: u64,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
}

/// `Span` plus the validator-set data the coordinator attaches to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeimdallSpan {
    #[serde(flatten)]
    pub span: Span,
    pub validators: Vec<SpanValidator>,
    pub selected_producers: Vec<SpanValidator>,
    pub chain_id: String,
}

/// A validator as reported by the coordinator inside a span document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanValidator {
    pub address: Address,
    pub voting_power: i64,
    #[serde(default)]
    pub proposer_priority: i64,
}

/// A single coordinator-issued cross-chain event, ordered by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u64,
    pub contract: Address,
    pub data: Bytes,
    pub tx_hash: B256,
    pub chain_id: String,
    pub time: u64,
}

/// Descriptor of a committed state-sync record, attached to the block at
/// finalization for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSyncData {
    pub id: u64,
    pub contract: Address,
    pub data: Bytes,
    pub tx_hash: B256,
}

/// Per-address code/balance override applied by the genesis-alloc patcher at
/// a specific block number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocOverride {
    pub code: Bytes,
    pub balance: U256,
}
