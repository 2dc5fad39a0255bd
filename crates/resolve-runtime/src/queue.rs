//! C8: the parallel enrichment queue. A fixed pool of W workers drains a
//! FIFO of Layer-1 results that still need the agentic sub-workflow,
//! per §4.8.
//!
//! Adapted from the teacher's `StreamingOrchestrator`'s control/progress
//! vocabulary (`StreamControl`, phase-tagged `StreamProgress`), combined
//! with the original `AgenticEnrichmentQueue`'s semaphore-bound worker pool
//! and idempotent stage-gated `enqueue`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use resolve_agentic::{AgenticWorkflow, ReceiptMatch, WorkflowInputs};
use resolve_core::{EnrichedTx, ResolveResult, Stage, StreamProgress};
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

/// Invoked once per completed transaction; models the
/// `POST /internal/enrichment-update` persistence callback from §6. Failures
/// are logged and otherwise ignored — the in-memory result is authoritative.
#[async_trait]
pub trait PersistenceCallback: Send + Sync {
    async fn notify(&self, enriched: &EnrichedTx) -> ResolveResult<()>;
}

struct WorkItem {
    id: String,
    layer1_result: EnrichedTx,
    currency: String,
    mail_grant: Option<String>,
    receipt_match: Option<ReceiptMatch>,
}

#[derive(Default)]
struct Counters {
    total: AtomicUsize,
    layer1_completed: AtomicUsize,
    agentic_queued: AtomicUsize,
    agentic_completed: AtomicUsize,
}

struct QueueState {
    counters: Counters,
    stage_map: Mutex<HashMap<String, Stage>>,
    results: Mutex<HashMap<String, EnrichedTx>>,
    failures: Mutex<HashMap<String, String>>,
    drained: Notify,
    started_at: Mutex<Option<Instant>>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            counters: Counters::default(),
            stage_map: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            drained: Notify::new(),
            started_at: Mutex::new(None),
        }
    }

    fn is_drained(&self) -> bool {
        self.counters.agentic_queued.load(Ordering::SeqCst)
            == self.counters.agentic_completed.load(Ordering::SeqCst)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at
            .lock()
            .unwrap()
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Bounded worker pool draining ids Layer 1 couldn't confidently settle.
pub struct ParallelEnrichmentQueue {
    state: Arc<QueueState>,
    work_tx: Option<mpsc::Sender<WorkItem>>,
    worker_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    workers: usize,
}

impl ParallelEnrichmentQueue {
    pub fn new(workers: usize) -> Self {
        Self {
            state: Arc::new(QueueState::new()),
            work_tx: None,
            worker_handles: Mutex::new(Vec::new()),
            workers: workers.max(1),
        }
    }

    pub fn set_total(&self, n: usize) {
        self.state.counters.total.store(n, Ordering::SeqCst);
    }

    pub fn mark_layer1_complete(&self, id: &str) {
        self.state.counters.layer1_completed.fetch_add(1, Ordering::SeqCst);
        self.state
            .stage_map
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert(Stage::NtropyDone);
    }

    /// Starts the `W` worker tasks. Must be called once, before any
    /// `enqueue`.
    pub fn start(
        &mut self,
        workflow: Arc<AgenticWorkflow>,
        persistence: Option<Arc<dyn PersistenceCallback>>,
    ) {
        let (tx, rx) = mpsc::channel::<WorkItem>(self.workers * 4);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        *self.state.started_at.lock().unwrap() = Some(Instant::now());

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let rx = Arc::clone(&rx);
            let state = Arc::clone(&self.state);
            let workflow = Arc::clone(&workflow);
            let persistence = persistence.clone();
            handles.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, rx, state, workflow, persistence).await;
            }));
        }

        self.work_tx = Some(tx);
        *self.worker_handles.lock().unwrap() = handles;
    }

    async fn worker_loop(
        worker_id: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>,
        state: Arc<QueueState>,
        workflow: Arc<AgenticWorkflow>,
        persistence: Option<Arc<dyn PersistenceCallback>>,
    ) {
        loop {
            let item = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(item) = item else {
                break;
            };

            state
                .stage_map
                .lock()
                .unwrap()
                .insert(item.id.clone(), Stage::AgenticProcessing);

            let result = workflow
                .run(
                    item.layer1_result,
                    WorkflowInputs {
                        currency: &item.currency,
                        mail_grant: item.mail_grant.as_deref(),
                        receipt_match: item.receipt_match.as_ref(),
                    },
                )
                .await;

            state
                .stage_map
                .lock()
                .unwrap()
                .insert(item.id.clone(), Stage::AgenticDone);
            state.counters.agentic_completed.fetch_add(1, Ordering::SeqCst);

            if let Some(callback) = &persistence {
                if let Err(err) = callback.notify(&result).await {
                    warn!(worker = worker_id, transaction_id = %item.id, error = %err, "persistence callback failed");
                }
            }
            state.results.lock().unwrap().insert(item.id.clone(), result);
            state.drained.notify_waiters();
        }
        info!(worker = worker_id, "agentic worker stopped");
    }

    /// Idempotently enqueues a Layer-1 result for agentic processing.
    /// Refuses (returns `false`) ids whose stage is neither `pending` nor
    /// `ntropy_done`.
    pub fn enqueue(
        &self,
        id: String,
        layer1_result: EnrichedTx,
        currency: String,
        mail_grant: Option<String>,
        receipt_match: Option<ReceiptMatch>,
    ) -> bool {
        let current_stage = self
            .state
            .stage_map
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(Stage::Pending);
        if !current_stage.is_enqueueable() {
            return false;
        }

        let Some(tx) = &self.work_tx else {
            return false;
        };

        self.state
            .stage_map
            .lock()
            .unwrap()
            .insert(id.clone(), Stage::AgenticQueued);
        self.state.counters.agentic_queued.fetch_add(1, Ordering::SeqCst);

        let item = WorkItem {
            id,
            layer1_result,
            currency,
            mail_grant,
            receipt_match,
        };
        match tx.try_send(item) {
            Ok(()) => true,
            Err(_) => {
                self.state.counters.agentic_queued.fetch_sub(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Whether every queued id has a completed result. Exposed alongside
    /// [`Self::wait_until_drained`] so callers that want progress ticks while
    /// waiting (the orchestrator's `agentic_enriching` phase) can poll it
    /// directly instead of blocking on the notify-based wait.
    pub fn is_drained(&self) -> bool {
        self.state.is_drained()
    }

    pub fn progress(&self) -> StreamProgress {
        let mut progress = StreamProgress::new(
            "agentic_enriching",
            self.state.counters.total.load(Ordering::SeqCst),
        );
        progress.layer1_completed = self.state.counters.layer1_completed.load(Ordering::SeqCst);
        progress.agentic_queued = self.state.counters.agentic_queued.load(Ordering::SeqCst);
        progress.agentic_completed = self.state.counters.agentic_completed.load(Ordering::SeqCst);
        progress.queue_depth = progress.agentic_queued.saturating_sub(progress.agentic_completed);
        progress.elapsed_ms = self.state.elapsed_ms();
        progress.recompute_rate();
        progress
    }

    /// Waits until `agentic_queued == agentic_completed` or `timeout`
    /// elapses, whichever comes first. Returns `true` if fully drained.
    pub async fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state.is_drained() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let notified = self.state.drained.notified();
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return self.state.is_drained();
            }
        }
    }

    /// Cancels all workers and awaits their termination.
    pub async fn stop(&mut self) {
        self.work_tx = None;
        let handles = std::mem::take(&mut *self.worker_handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Results collected so far, keyed by transaction id.
    pub fn results(&self) -> HashMap<String, EnrichedTx> {
        self.state.results.lock().unwrap().clone()
    }

    pub fn record_failure(&self, id: &str, message: impl Into<String>) {
        self.state.failures.lock().unwrap().insert(id.to_string(), message.into());
        self.state.stage_map.lock().unwrap().insert(id.to_string(), Stage::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolve_agentic::SubscriptionMatcher;
    use resolve_core::{BudgetCategory, Flow, LlmProvider, SearchSnippet, SubscriptionCatalog, SubscriptionCatalogEntry, TransactionType, WebSearchProvider};

    struct EmptyCatalog;
    #[async_trait]
    impl SubscriptionCatalog for EmptyCatalog {
        async fn lookup(&self, _merchant: &str) -> ResolveResult<Vec<SubscriptionCatalogEntry>> {
            Ok(vec![])
        }
        async fn upsert(&self, _entry: SubscriptionCatalogEntry) -> ResolveResult<()> {
            Ok(())
        }
    }
    struct EmptySearch;
    #[async_trait]
    impl WebSearchProvider for EmptySearch {
        async fn search(&self, _q: &str, _n: usize) -> ResolveResult<Vec<SearchSnippet>> {
            Ok(vec![])
        }
    }
    struct EmptyLlm;
    #[async_trait]
    impl LlmProvider for EmptyLlm {
        async fn complete(&self, _s: &str, _u: &str) -> ResolveResult<String> {
            Ok("{}".to_string())
        }
    }

    fn sample_tx(id: &str) -> EnrichedTx {
        EnrichedTx {
            id: id.into(),
            original_description: "UNKNOWN MERCHANT".into(),
            merchant_clean_name: None,
            merchant_logo: None,
            merchant_site: None,
            labels: vec!["uncategorized".into()],
            is_recurring: false,
            recurrence_period: None,
            amount_minor: 500,
            direction: Flow::Outgoing,
            budget_category: BudgetCategory::Discretionary,
            date: "2024-03-01".into(),
            ntropy_confidence: 0.3,
            agentic_confidence: None,
            stage: Stage::NtropyDone,
            source: None,
            reasoning_trace: vec![],
            context_data: Default::default(),
            exclude_from_analysis: false,
            transaction_type: TransactionType::Regular,
            linked_transaction_id: None,
        }
    }

    fn workflow() -> Arc<AgenticWorkflow> {
        let matcher = Arc::new(SubscriptionMatcher::new(
            Arc::new(EmptyCatalog),
            Arc::new(EmptySearch),
            Arc::new(EmptyLlm),
        ));
        Arc::new(AgenticWorkflow::new(matcher, Arc::new(EmptyLlm), 0.80))
    }

    /// An LLM that sleeps before replying, for exercising the queue's
    /// concurrency bound and drain-timeout behaviour (spec scenarios 5, 6).
    struct SlowLlm {
        delay: Duration,
    }
    #[async_trait]
    impl LlmProvider for SlowLlm {
        async fn complete(&self, _s: &str, _u: &str) -> ResolveResult<String> {
            tokio::time::sleep(self.delay).await;
            Ok("{}".to_string())
        }
    }

    fn slow_workflow(delay: Duration) -> Arc<AgenticWorkflow> {
        let matcher = Arc::new(SubscriptionMatcher::new(
            Arc::new(EmptyCatalog),
            Arc::new(EmptySearch),
            Arc::new(SlowLlm { delay }),
        ));
        Arc::new(AgenticWorkflow::new(matcher, Arc::new(SlowLlm { delay }), 0.80))
    }

    #[tokio::test]
    async fn concurrency_bound_never_exceeds_worker_count() {
        const WORKERS: usize = 5;
        const ITEMS: usize = 20;

        let mut queue = ParallelEnrichmentQueue::new(WORKERS);
        queue.set_total(ITEMS);
        queue.start(slow_workflow(Duration::from_millis(25)), None);

        for i in 0..ITEMS {
            let id = format!("t{i}");
            assert!(queue.enqueue(id.clone(), sample_tx(&id), "GBP".into(), None, None));
        }

        let max_concurrent = Arc::new(AtomicUsize::new(0));
        let state = Arc::clone(&queue.state);
        let watcher_max = Arc::clone(&max_concurrent);
        let watcher = tokio::spawn(async move {
            loop {
                let processing = state
                    .stage_map
                    .lock()
                    .unwrap()
                    .values()
                    .filter(|s| **s == Stage::AgenticProcessing)
                    .count();
                watcher_max.fetch_max(processing, Ordering::SeqCst);
                if state.is_drained() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let drained = queue.wait_until_drained(Duration::from_secs(10)).await;
        assert!(drained);
        let _ = watcher.await;

        assert!(
            max_concurrent.load(Ordering::SeqCst) <= WORKERS,
            "observed {} ids in agentic_processing simultaneously with {WORKERS} workers",
            max_concurrent.load(Ordering::SeqCst)
        );
        assert_eq!(queue.results().len(), ITEMS);

        queue.stop().await;
    }

    #[tokio::test]
    async fn drain_timeout_returns_partial_results_without_panicking() {
        let mut queue = ParallelEnrichmentQueue::new(1);
        queue.set_total(3);
        queue.start(slow_workflow(Duration::from_millis(300)), None);

        for i in 0..3 {
            let id = format!("t{i}");
            assert!(queue.enqueue(id.clone(), sample_tx(&id), "GBP".into(), None, None));
        }

        let drained = queue.wait_until_drained(Duration::from_millis(50)).await;
        assert!(!drained);

        let stage_map = queue.state.stage_map.lock().unwrap().clone();
        let unsettled = stage_map
            .values()
            .filter(|s| matches!(s, Stage::AgenticProcessing | Stage::AgenticQueued))
            .count();
        assert!(unsettled > 0, "expected at least one id still queued or processing after the timeout");

        queue.stop().await;
    }

    #[tokio::test]
    async fn enqueue_refuses_non_enqueueable_stage() {
        let mut queue = ParallelEnrichmentQueue::new(2);
        queue.start(workflow(), None);
        queue.state.stage_map.lock().unwrap().insert("t1".into(), Stage::AgenticDone);

        let accepted = queue.enqueue("t1".into(), sample_tx("t1"), "GBP".into(), None, None);
        assert!(!accepted);
        queue.stop().await;
    }

    #[tokio::test]
    async fn enqueue_and_drain_produces_a_result() {
        let mut queue = ParallelEnrichmentQueue::new(2);
        queue.set_total(1);
        queue.start(workflow(), None);

        let accepted = queue.enqueue("t1".into(), sample_tx("t1"), "GBP".into(), None, None);
        assert!(accepted);

        let drained = queue.wait_until_drained(Duration::from_secs(5)).await;
        assert!(drained);

        let results = queue.results();
        assert!(results.contains_key("t1"));
        assert_eq!(results["t1"].stage, Stage::AgenticDone);

        queue.stop().await;
    }
}
