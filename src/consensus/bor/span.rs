//! Bounded span cache with deterministic estimation and bounded look-ahead
//! fetch from the coordinator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};
use tokio_util::sync::CancellationToken;

use super::coordinator::{with_retry, Coordinator};
use super::constants::{MAX_SPAN_FETCH_LIMIT, SPAN_CACHE_SIZE};
use super::error::Error;
use super::types::HeimdallSpan;

/// Safe to use concurrently only under an external lock: internal mutability
/// (cache and `latest_known_span_id` updates) is not atomic across calls.
pub struct SpanStore {
    coordinator: Arc<dyn Coordinator>,
    cache: Mutex<LruMap<u64, HeimdallSpan, ByLength>>,
    latest_known_span_id: AtomicU64,
    zeroth_span_end: u64,
    default_span_length: u64,
}

impl SpanStore {
    pub fn new(coordinator: Arc<dyn Coordinator>, zeroth_span_end: u64, default_span_length: u64) -> Self {
        Self {
            coordinator,
            cache: Mutex::new(LruMap::new(ByLength::new(SPAN_CACHE_SIZE))),
            latest_known_span_id: AtomicU64::new(0),
            zeroth_span_end,
            default_span_length,
        }
    }

    pub async fn span_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<HeimdallSpan, Error> {
        if let Some(span) = self.cache.lock().get(&id) {
            return Ok(span.clone());
        }
        let span = with_retry(cancel, || self.coordinator.span(id)).await?;
        self.cache.lock().insert(id, span.clone());
        self.latest_known_span_id.fetch_max(id, Ordering::SeqCst);
        Ok(span)
    }

    fn estimate_span_id(&self, block: u64) -> u64 {
        if block <= self.zeroth_span_end {
            return 0;
        }
        1 + (block - self.zeroth_span_end - 1) / self.default_span_length
    }

    /// Finds the span covering `block`, extending the cache forward from
    /// `latest_known_span_id` if needed.
    pub async fn span_by_block(&self, block: u64, cancel: &CancellationToken) -> Result<HeimdallSpan, Error> {
        let estimate = self.estimate_span_id(block);
        let primed = self.span_by_id(estimate, cancel).await?;
        if primed.span.start_block <= block && block <= primed.span.end_block {
            return Ok(primed);
        }

        let latest = self.latest_known_span_id.load(Ordering::SeqCst);
        let mut id = latest;
        loop {
            let span = self.span_by_id(id, cancel).await?;
            if span.span.start_block <= block && block <= span.span.end_block {
                return Ok(span);
            }
            if id == 0 {
                break;
            }
            id -= 1;
        }

        let latest_span = self.span_by_id(latest, cancel).await?;
        if block > latest_span.span.end_block {
            let mut next_id = latest + 1;
            let limit = latest + MAX_SPAN_FETCH_LIMIT;
            while next_id <= limit {
                let span = self.span_by_id(next_id, cancel).await?;
                if span.span.start_block <= block && block <= span.span.end_block {
                    return Ok(span);
                }
                next_id += 1;
            }
        }

        Err(Error::SpanNotFound(block))
    }
}
