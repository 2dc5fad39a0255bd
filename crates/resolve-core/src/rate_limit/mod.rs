//! Bounding concurrent calls to external providers.
//!
//! Adapted from the teacher's token-bucket `RateLimiter` (which paced
//! generation throughput); here the concern is purely a concurrency cap —
//! §5 requires Layer 1 to hold at most 10 in-flight provider calls and the
//! agentic queue to run at most W sub-workflows at once — so the
//! implementation is a thin, typed wrapper over `tokio::sync::Semaphore`
//! rather than a leaky-bucket clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds the number of concurrent external calls in flight.
#[derive(Clone)]
pub struct ProviderLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    acquired_total: Arc<AtomicU64>,
}

/// A held permit; dropping it releases the slot back to the limiter.
pub struct ProviderPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl ProviderLimiter {
    /// Creates a limiter allowing up to `capacity` concurrent calls.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            acquired_total: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> ProviderPermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("ProviderLimiter semaphore is never closed");
        self.acquired_total.fetch_add(1, Ordering::Relaxed);
        ProviderPermit { _permit: permit }
    }

    /// The configured concurrency cap.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many slots are currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total number of permits handed out over this limiter's lifetime.
    pub fn acquired_total(&self) -> u64 {
        self.acquired_total.load(Ordering::Relaxed)
    }
}
