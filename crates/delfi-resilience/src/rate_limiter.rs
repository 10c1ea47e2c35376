//! Dual rate limiter bounding concurrent database and LLM work.
//!
//! Two independent semaphores hand out scoped permits. Acquisition
//! waits fairly (FIFO) up to a caller-supplied timeout; a permit is
//! released when dropped, so every exit path including cancellation
//! gives the slot back exactly once.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Waiting for a slot exceeded the caller's timeout.
#[derive(Debug, Error)]
#[error("timed out waiting for a {resource} slot after {waited:?}")]
pub struct SlotTimeout {
    /// Which pool timed out: "query" or "llm".
    pub resource: &'static str,
    pub waited: Duration,
}

/// A held concurrency slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Process-wide concurrency limits for query execution and LLM calls.
#[derive(Debug)]
pub struct RateLimiter {
    query_slots: Arc<Semaphore>,
    llm_slots: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(max_concurrent_queries: usize, max_concurrent_llm: usize) -> Self {
        Self {
            query_slots: Arc::new(Semaphore::new(max_concurrent_queries)),
            llm_slots: Arc::new(Semaphore::new(max_concurrent_llm)),
        }
    }

    /// Acquire a query execution slot, waiting at most `wait`.
    pub async fn for_queries(&self, wait: Duration) -> Result<RatePermit, SlotTimeout> {
        Self::acquire(&self.query_slots, "query", wait).await
    }

    /// Acquire an LLM call slot, waiting at most `wait`.
    pub async fn for_llm(&self, wait: Duration) -> Result<RatePermit, SlotTimeout> {
        Self::acquire(&self.llm_slots, "llm", wait).await
    }

    /// Free query slots right now.
    pub fn available_query_slots(&self) -> usize {
        self.query_slots.available_permits()
    }

    /// Free LLM slots right now.
    pub fn available_llm_slots(&self) -> usize {
        self.llm_slots.available_permits()
    }

    async fn acquire(
        slots: &Arc<Semaphore>,
        resource: &'static str,
        wait: Duration,
    ) -> Result<RatePermit, SlotTimeout> {
        let acquired = tokio::time::timeout(wait, Arc::clone(slots).acquire_owned()).await;
        match acquired {
            Ok(Ok(permit)) => {
                debug!(resource, "acquired rate limit slot");
                Ok(RatePermit { _permit: permit })
            }
            // The semaphore is never closed; treat closure like a
            // timeout rather than panicking.
            Ok(Err(_)) | Err(_) => Err(SlotTimeout {
                resource,
                waited: wait,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = RateLimiter::new(2, 1);
        assert_eq!(limiter.available_query_slots(), 2);

        let permit = limiter.for_queries(Duration::from_millis(50)).await.unwrap();
        assert_eq!(limiter.available_query_slots(), 1);

        drop(permit);
        assert_eq!(limiter.available_query_slots(), 2);
    }

    #[tokio::test]
    async fn test_pools_are_independent() {
        let limiter = RateLimiter::new(1, 1);
        let _query = limiter.for_queries(Duration::from_millis(50)).await.unwrap();
        // Exhausting the query pool leaves the LLM pool untouched.
        let _llm = limiter.for_llm(Duration::from_millis(50)).await.unwrap();
        assert_eq!(limiter.available_query_slots(), 0);
        assert_eq!(limiter.available_llm_slots(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let limiter = RateLimiter::new(1, 1);
        let _held = limiter.for_queries(Duration::from_millis(50)).await.unwrap();

        let err = limiter
            .for_queries(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.resource, "query");
    }

    #[tokio::test]
    async fn test_slot_frees_after_drop_even_on_error_paths() {
        let limiter = RateLimiter::new(1, 1);
        {
            let _permit = limiter.for_llm(Duration::from_millis(50)).await.unwrap();
            assert_eq!(limiter.available_llm_slots(), 0);
            // Scope exit stands in for an early return or error.
        }
        assert_eq!(limiter.available_llm_slots(), 1);

        limiter.for_llm(Duration::from_millis(50)).await.unwrap();
    }
}
