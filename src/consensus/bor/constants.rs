//! Header `extraData` layout and tuning constants for the Bor engine.

use alloy_primitives::Address;

/// Fixed 32-byte vanity prefix present in every header.
pub const EXTRA_VANITY: usize = 32;
/// Fixed 65-byte ECDSA signature suffix (r, s, v).
pub const EXTRA_SEAL: usize = 65;
/// Per-validator record width in the extra-data validators section: 20-byte
/// address + 20-byte big-endian voting power.
pub const VALIDATOR_HEADER_BYTES_LEN: usize = 40;

/// Upper bound on any single validator's (or the set's total) voting power.
pub const MAX_TOTAL_VOTING_POWER: i64 = i64::MAX / 8;

/// Block interval at which snapshots are persisted to the backing store.
pub const CHECKPOINT_INTERVAL: u64 = 1024;
/// Size of the in-memory snapshot LRU, keyed by block hash.
pub const IN_MEMORY_SNAPSHOTS: u32 = 128;
/// Size of the signer-recovery LRU, keyed by seal hash.
pub const IN_MEMORY_SIGNATURES: u32 = 4096;

/// Size of the span-id LRU.
pub const SPAN_CACHE_SIZE: u32 = 10;
/// Upper bound on how many span ids the store will fetch ahead when
/// extending the cache forward to cover a requested block.
pub const MAX_SPAN_FETCH_LIMIT: u64 = 10_000;

/// Page size used when paging state-sync event records from the coordinator.
pub const STATE_FETCH_LIMIT: u64 = 50;

/// Fixed retry backoff for coordinator calls.
pub const COORDINATOR_RETRY_INTERVAL_SECS: u64 = 5;

/// Reserved address from which system messages originate.
pub const SYSTEM_ADDRESS: Address = Address::new([
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe,
]);
