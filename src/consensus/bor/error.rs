//! Error taxonomy for the Bor consensus engine.

use alloy_primitives::{Address, B256};

/// Every failure mode the engine can surface, grouped by the stage that
/// detects it: static header checks, cascading checks, authority checks,
/// validator-set algebra, snapshot reconstruction, the coordinator, sealing,
/// and state sync.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- static header errors --
    #[error("header extra-data is missing the 32-byte vanity prefix")]
    MissingVanity,
    #[error("header extra-data is missing the 65-byte signature suffix")]
    MissingSignature,
    #[error("non-sprint-end header carries a non-empty validators section")]
    ExtraValidators,
    #[error("sprint-end header's validators section is not a multiple of 40 bytes (got {len} bytes)")]
    InvalidSpanValidators { len: usize },
    #[error("mix digest is non-zero")]
    InvalidMixDigest,
    #[error("uncle hash does not equal keccak256(rlp([]))")]
    InvalidUncleHash,
    #[error("difficulty is missing on a non-genesis header")]
    InvalidDifficulty,
    #[error("header timestamp {header_time} is in the future (now={now})")]
    FutureBlock { header_time: u64, now: u64 },
    #[error("gas limit {0} exceeds 2^63 - 1")]
    GasLimitOverflow(u64),

    // -- cascading errors --
    #[error("parent header {0} is unknown")]
    UnknownAncestor(B256),
    #[error("header time {header_time} is before parent time {parent_time} + period {period}")]
    InvalidTimestamp { parent_time: u64, period: u64, header_time: u64 },
    #[error("validator bytes at sprint boundary mismatch")]
    MismatchingValidators { expected: Vec<u8>, actual: Vec<u8> },
    #[error("header time {header_time} is before the earliest allowed producer time {earliest}")]
    BlockTooSoon { header_time: u64, earliest: u64 },
    #[error("header difficulty {got} does not match expected {expected}")]
    WrongDifficulty { expected: u64, got: u64 },

    // -- authority errors --
    #[error("signer {0} is not a member of the validator set")]
    UnauthorizedSigner(Address),
    #[error("proposer {0} is not a member of the validator set")]
    UnauthorizedProposer(Address),
    #[error("validator set has no proposer")]
    ProposerNotFound,
    #[error("signer {0} not found in the validator set")]
    SignerNotFound(Address),
    #[error("signer {0} already signed a block within the current sprint window")]
    RecentlySigned(Address),

    // -- set-algebra errors --
    #[error("total voting power {total} exceeds the maximum {max}")]
    TotalVotingPowerExceeded { total: i64, max: i64 },
    #[error("duplicate validator address {0}")]
    DuplicateValidator(Address),
    #[error("negative voting power for validator {0}")]
    NegativeVotingPower(Address),
    #[error("validator {0} not found")]
    ValidatorNotFound(Address),

    // -- snapshot errors --
    #[error("header range {from}..{to} does not continue from snapshot at {at}")]
    OutOfRangeChain { at: u64, from: u64, to: u64 },

    // -- span-store errors --
    #[error("no span covers block {0}")]
    SpanNotFound(u64),

    // -- coordinator errors --
    #[error("coordinator chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: String, got: String },
    #[error("coordinator returned a malformed record: {0}")]
    MalformedRecord(String),
    #[error("coordinator call failed, eligible for retry: {0}")]
    CoordinatorUnavailable(String),
    #[error("operation aborted: engine is shutting down")]
    Shutdown,

    // -- sealing errors --
    #[error("a seal attempt for block {0} is already in flight")]
    SealingInFlight(u64),
    #[error("cannot seal the genesis block")]
    UnknownBlock,
    #[error("refusing to seal empty block {0} on a zero-period chain")]
    EmptyBlockOnZeroPeriod(u64),

    // -- state-sync errors --
    #[error("invalid state-sync record: {0}")]
    InvalidStateReceived(String),

    // -- rlp / signature recovery --
    #[error("rlp encoding error: {0}")]
    Rlp(String),
    #[error("ecdsa signature recovery failed")]
    RecoverEcdsa,
}

impl Error {
    /// Transient coordinator failures are retried by
    /// [`crate::consensus::bor::coordinator::with_retry`]; everything else
    /// (chain-id mismatch, malformed record, and the rest) is terminal and
    /// surfaces to the caller immediately (`spec.md` §7).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CoordinatorUnavailable(_))
    }
}
