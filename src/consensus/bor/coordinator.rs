//! External collaborator seams: the Heimdall coordinator, the chain-header
//! reader, and the system-message caller. The engine consumes these only at
//! their interfaces; a host node supplies the implementations.

use std::future::Future;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::constants::COORDINATOR_RETRY_INTERVAL_SECS;
use super::error::Error;
use super::types::{BlockNumber, EventRecord, HeimdallSpan, Header};

/// Read-only access to chain header history, used for snapshot
/// reconstruction's backward walk.
pub trait HeaderReader: Send + Sync {
    fn header_by_hash(&self, hash: &B256) -> Option<Header>;
    fn header_by_number(&self, number: BlockNumber) -> Option<Header>;
}

/// The Heimdall coordinator's request/response contract -- the only
/// external service the core consumes.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn span(&self, id: u64) -> Result<HeimdallSpan, Error>;

    /// Ascending-by-id, paginated by the caller supplying successive `from_id`s.
    async fn state_sync_events(&self, from_id: u64, to_time: u64) -> Result<Vec<EventRecord>, Error>;

    /// Idempotent shutdown.
    async fn close(&self) -> Result<(), Error>;
}

/// Seam for view-only state reads and privileged system-message application,
/// both of which live in the (out-of-scope) EVM/state layer.
pub trait SystemCaller: Send + Sync {
    /// Reads `last_state_id` from the state-receiver contract.
    fn last_state_id(&self) -> Result<u64, Error>;

    /// Applies a system-originated call: zero gas price, zero value, no
    /// nonce check, `~u64::MAX/2` gas. Failure does not abort the block; the
    /// callee decides whether failure is expected (the validator contract's
    /// `commitSpan` returns no data on success or failure alike).
    fn call_system(&self, to: Address, data: Bytes) -> Result<Bytes, Error>;
}

/// Retries a coordinator call on [`Error::is_transient`] failure with a fixed
/// backoff, cancellable at every tick. Terminal errors (chain-id mismatch,
/// malformed record) propagate immediately without retrying (`spec.md` §5,
/// §7, §9: "prefer a cancellable ticker over a sleep so shutdown is
/// prompt").
pub async fn with_retry<T, F, Fut>(cancel: &CancellationToken, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                tracing::warn!(%err, "coordinator call failed, retrying in {COORDINATOR_RETRY_INTERVAL_SECS}s");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Shutdown),
                    _ = tokio::time::sleep(Duration::from_secs(COORDINATOR_RETRY_INTERVAL_SECS)) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}
