//! Stream events, progress snapshots, and cooperative cancellation.
//!
//! Adapted from the teacher's generic `StreamEvent<T>`/`StreamProgress`
//! vocabulary, re-purposed for cascade phases instead of generation phases.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Events emitted while a batch moves through the cascade.
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    /// A completed item (an `EnrichedTx`, typically).
    Data(T),
    /// A progress update; always carries the running snapshot.
    Progress(StreamProgress),
    /// A non-fatal error: this record failed but the batch continues.
    Error(StreamError),
    /// Terminal event; only emitted once per invocation.
    Complete(StreamSummary),
}

impl<T> StreamEvent<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::Complete(_))
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            StreamEvent::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// Running progress snapshot, per §4.8/§4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamProgress {
    /// Current cascade phase name (`extracting`, `detecting_transfers`,
    /// `enriching`, `agentic_enriching`, `classifying`, `complete`).
    pub phase: String,
    pub total: usize,
    pub layer1_completed: usize,
    pub agentic_queued: usize,
    pub agentic_completed: usize,
    pub queue_depth: usize,
    pub tx_per_minute: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    pub elapsed_ms: u64,
}

impl StreamProgress {
    pub fn new(phase: impl Into<String>, total: usize) -> Self {
        Self {
            phase: phase.into(),
            total,
            layer1_completed: 0,
            agentic_queued: 0,
            agentic_completed: 0,
            queue_depth: 0,
            tx_per_minute: 0.0,
            eta_seconds: None,
            elapsed_ms: 0,
        }
    }

    /// Recomputes `tx_per_minute` and `eta_seconds` from `agentic_completed`
    /// and `elapsed_ms`, per C8's `rate = completed/elapsed x 60`.
    pub fn recompute_rate(&mut self) {
        if self.elapsed_ms == 0 {
            self.tx_per_minute = 0.0;
            self.eta_seconds = None;
            return;
        }
        let elapsed_secs = self.elapsed_ms as f64 / 1000.0;
        self.tx_per_minute = (self.agentic_completed as f64 / elapsed_secs) * 60.0;
        let remaining = self.agentic_queued.saturating_sub(self.agentic_completed);
        self.eta_seconds = if self.tx_per_minute > 0.0 {
            Some((remaining as f64 / self.tx_per_minute) * 60.0)
        } else {
            None
        };
    }
}

/// A non-fatal error attached to a single record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamError {
    pub message: String,
    pub transaction_id: Option<String>,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transaction_id: None,
        }
    }

    pub fn for_transaction(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.transaction_id {
            Some(id) => write!(f, "{id}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for StreamError {}

/// Terminal summary carried by the `complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub total_items: usize,
    pub total_time_ms: u64,
    pub ghost_pairs_detected: usize,
    pub agentic_enriched: usize,
    pub error_count: usize,
}

/// Backpressure handling strategy for a bounded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureStrategy {
    /// Block the producer until space is available (the cascade's default:
    /// enqueue never drops a transaction).
    #[default]
    Block,
    /// Drop the oldest buffered item to make room.
    DropOldest,
    /// Reject the new item, leaving the buffer untouched.
    DropNewest,
}

/// Cooperative pause/cancel handle shared between a producer task and its
/// supervisor (the streaming orchestrator, or `stop()` on the queue).
#[derive(Debug)]
pub struct StreamControl {
    cancelled: AtomicBool,
    paused: AtomicBool,
}

impl StreamControl {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rate_zero_when_no_time_elapsed() {
        let progress = StreamProgress::new("enriching", 10);
        assert_eq!(progress.tx_per_minute, 0.0);
        assert!(progress.eta_seconds.is_none());
    }

    #[test]
    fn progress_recompute_rate() {
        let mut progress = StreamProgress::new("agentic_enriching", 100);
        progress.agentic_queued = 100;
        progress.agentic_completed = 30;
        progress.elapsed_ms = 60_000;
        progress.recompute_rate();
        assert_eq!(progress.tx_per_minute, 30.0);
        assert_eq!(progress.eta_seconds, Some(140.0));
    }

    #[test]
    fn stream_control_pause_resume_cancel() {
        let control = StreamControl::new();
        assert!(!control.is_cancelled());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
        control.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn backpressure_strategy_default_is_block() {
        assert_eq!(BackpressureStrategy::default(), BackpressureStrategy::Block);
    }
}
