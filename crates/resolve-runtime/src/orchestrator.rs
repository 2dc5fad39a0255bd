//! C9: the streaming orchestrator. Sequences C1-C4, the C8 queue, and a
//! final reclassification pass, emitting phase-tagged [`StreamEvent`]s the
//! way the teacher's `StreamingOrchestrator` emitted generation events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use resolve_agentic::{assign_receipts, AgenticWorkflow};
use resolve_cascade::{classify, detect_transfer_pairs, normalize_batch, MerchantEnricher};
use resolve_core::{
    EmailProvider, EnrichedTx, MerchantEnrichmentProvider, Stage, StreamEvent, StreamProgress,
    StreamReceiver, StreamSummary, stream_channel,
};
use tracing::{info, warn};

use crate::queue::{ParallelEnrichmentQueue, PersistenceCallback};

/// Records Layer 1 runs in batches of this size before handing leftovers to
/// the agentic queue, per §5.
pub const LAYER1_BATCH_SIZE: usize = 10;

/// Default cap on how long `agentic_enriching` waits for the queue to drain
/// before moving on with whatever completed, per §4.9.
pub const DEFAULT_AGENTIC_DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// How often `agentic_enriching` re-samples the queue and emits a fresh
/// [`StreamProgress`] while draining, substituting for a separate
/// `stream_progress()` iterator: the orchestrator already owns the sender,
/// so it ticks `ParallelEnrichmentQueue::progress()` itself.
const AGENTIC_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Everything the orchestrator needs for one `enrich_stream` call beyond the
/// raw batch itself.
pub struct EnrichRequest {
    pub raw_batch: Vec<resolve_core::RawTx>,
    pub user_id: String,
    pub connection_id: String,
    pub holder_name: Option<String>,
    pub country: Option<String>,
    pub mail_grant: Option<String>,
}

pub struct StreamingOrchestrator<P: MerchantEnrichmentProvider + 'static> {
    merchant_enricher: Arc<MerchantEnricher<P>>,
    email_provider: Option<Arc<dyn EmailProvider>>,
    agentic_workflow: Arc<AgenticWorkflow>,
    persistence: Option<Arc<dyn PersistenceCallback>>,
    workers: usize,
    tau: f64,
    receipt_match_min_confidence: f64,
    agentic_drain_timeout: Duration,
}

impl<P: MerchantEnrichmentProvider + 'static> StreamingOrchestrator<P> {
    pub fn new(
        merchant_enricher: Arc<MerchantEnricher<P>>,
        agentic_workflow: Arc<AgenticWorkflow>,
        tau: f64,
        workers: usize,
    ) -> Self {
        Self {
            merchant_enricher,
            email_provider: None,
            agentic_workflow,
            persistence: None,
            workers: workers.max(1),
            tau,
            receipt_match_min_confidence: tau,
            agentic_drain_timeout: DEFAULT_AGENTIC_DRAIN_TIMEOUT,
        }
    }

    pub fn with_email_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email_provider = Some(provider);
        self
    }

    pub fn with_persistence(mut self, callback: Arc<dyn PersistenceCallback>) -> Self {
        self.persistence = Some(callback);
        self
    }

    /// Overrides the minimum total score the receipt matcher requires to
    /// accept a match (defaults to τ). Distinct from the cascade-stop
    /// threshold: `EnrichmentConfig::receipt_match_min_confidence`.
    pub fn with_receipt_match_min_confidence(mut self, threshold: f64) -> Self {
        self.receipt_match_min_confidence = threshold;
        self
    }

    pub fn with_agentic_drain_timeout(mut self, timeout: Duration) -> Self {
        self.agentic_drain_timeout = timeout;
        self
    }

    /// Polls `queue` every [`AGENTIC_PROGRESS_INTERVAL`], emitting an
    /// `agentic_enriching` [`StreamEvent::Progress`] snapshot each time, until
    /// it drains or `self.agentic_drain_timeout` elapses. Returns whether it
    /// drained in time.
    async fn drain_queue_with_progress(
        &self,
        queue: &ParallelEnrichmentQueue,
        sender: &resolve_core::StreamSender<EnrichedTx>,
    ) -> bool {
        let deadline = Instant::now() + self.agentic_drain_timeout;
        loop {
            if queue.is_drained() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            tokio::time::sleep(AGENTIC_PROGRESS_INTERVAL.min(remaining)).await;
            let _ = sender.send(StreamEvent::Progress(queue.progress())).await;
        }
    }

    /// Runs the full cascade over `request.raw_batch` and returns a receiver
    /// of phase-tagged events: `extracting -> detecting_transfers ->
    /// enriching -> agentic_enriching -> classifying -> complete`.
    pub fn enrich_stream(self: Arc<Self>, request: EnrichRequest) -> StreamReceiver<EnrichedTx> {
        let (sender, receiver) = stream_channel(256);

        tokio::spawn(async move {
            let started_at = Instant::now();
            let total = request.raw_batch.len();
            let mut error_count = 0usize;

            // extracting
            let _ = sender
                .send(StreamEvent::Progress(StreamProgress::new("extracting", total)))
                .await;
            let mut norm_batch = Vec::with_capacity(total);
            for result in normalize_batch(&request.raw_batch) {
                match result {
                    Ok(norm) => norm_batch.push(norm),
                    Err(err) => {
                        error_count += 1;
                        let _ = sender
                            .send(StreamEvent::Error(resolve_core::StreamError::new(
                                err.to_string(),
                            )))
                            .await;
                    }
                }
            }

            // detecting_transfers
            let detection = detect_transfer_pairs(&norm_batch);
            let ghost_pairs_detected = detection.pairs.len();
            info!(connection_id = %request.connection_id, ghost_pairs_detected, "transfer pairs detected");
            for enriched in detection.enriched {
                let _ = sender.send_data(enriched).await;
            }
            let mut progress = StreamProgress::new("detecting_transfers", total);
            progress.layer1_completed = detection.processed_ids.len();
            progress.elapsed_ms = started_at.elapsed().as_millis() as u64;
            let _ = sender.send(StreamEvent::Progress(progress)).await;

            let remaining: Vec<_> = norm_batch
                .iter()
                .filter(|tx| !detection.processed_ids.contains(&tx.id))
                .cloned()
                .collect();

            // enriching (Layer 1, chunked)
            let mut needs_agentic = Vec::new();
            let mut settled = Vec::new();
            for chunk in remaining.chunks(LAYER1_BATCH_SIZE) {
                let results = self.merchant_enricher.enrich_batch(chunk).await;
                for result in results {
                    if result.needs_agentic {
                        needs_agentic.push(result.enriched);
                    } else {
                        settled.push(result.enriched.clone());
                        let _ = sender.send_data(result.enriched).await;
                    }
                }
                let mut progress = StreamProgress::new("enriching", total);
                progress.layer1_completed = settled.len() + needs_agentic.len() + detection.processed_ids.len();
                progress.elapsed_ms = started_at.elapsed().as_millis() as u64;
                let _ = sender.send(StreamEvent::Progress(progress)).await;
            }

            // agentic_enriching
            let receipts = match (&self.email_provider, &request.mail_grant) {
                (Some(provider), Some(grant)) => {
                    match provider.fetch_receipts(&request.user_id, grant).await {
                        Ok(receipts) => receipts,
                        Err(err) => {
                            warn!(error = %err, "receipt fetch failed, continuing without receipts");
                            Vec::new()
                        }
                    }
                }
                _ => Vec::new(),
            };
            let receipt_matches =
                assign_receipts(&needs_agentic, &receipts, self.receipt_match_min_confidence);

            let mut queue = ParallelEnrichmentQueue::new(self.workers);
            queue.set_total(needs_agentic.len());
            queue.start(Arc::clone(&self.agentic_workflow), self.persistence.clone());

            let currency = request
                .raw_batch
                .first()
                .map(|raw| raw.currency.clone())
                .unwrap_or_else(|| "GBP".to_string());

            for enriched in &needs_agentic {
                let receipt_match = receipt_matches.get(&enriched.id).cloned();
                queue.enqueue(
                    enriched.id.clone(),
                    enriched.clone(),
                    currency.clone(),
                    request.mail_grant.clone(),
                    receipt_match,
                );
            }

            // Per §4.9, `agentic_enriching` only fires when Layer 1 actually
            // left ids for the queue; an all-settled batch skips straight to
            // `classifying`.
            let drained = if needs_agentic.is_empty() {
                true
            } else {
                let _ = sender.send(StreamEvent::Progress(queue.progress())).await;
                self.drain_queue_with_progress(&queue, &sender).await
            };
            if !drained {
                warn!(connection_id = %request.connection_id, "agentic queue drain timed out, finishing with partial results");
            }
            let mut agentic_results = queue.results();
            queue.stop().await;

            // classifying: re-derive the budget category from whatever the
            // agentic sub-workflow learned (new labels, recurrence).
            let mut progress = StreamProgress::new("classifying", total);
            progress.layer1_completed = total - needs_agentic.len() + agentic_results.len();
            progress.agentic_queued = needs_agentic.len();
            progress.agentic_completed = agentic_results.len();
            progress.elapsed_ms = started_at.elapsed().as_millis() as u64;
            let _ = sender.send(StreamEvent::Progress(progress)).await;

            let mut agentic_enriched_count = 0usize;
            for enriched in needs_agentic {
                let mut enriched = match agentic_results.remove(&enriched.id) {
                    Some(result) => {
                        agentic_enriched_count += 1;
                        result
                    }
                    None => {
                        let mut fallback = enriched;
                        fallback.stage = Stage::Failed;
                        fallback.push_trace("orchestrator", "agentic queue did not drain in time");
                        fallback
                    }
                };
                enriched.budget_category = classify(
                    &enriched.labels,
                    &enriched.original_description,
                    enriched.is_recurring,
                    enriched.direction,
                );
                if enriched.stage != Stage::Failed {
                    enriched.stage = Stage::Complete;
                }
                let _ = sender.send_data(enriched).await;
            }

            let summary = StreamSummary {
                total_items: total,
                total_time_ms: started_at.elapsed().as_millis() as u64,
                ghost_pairs_detected,
                agentic_enriched: agentic_enriched_count,
                error_count,
            };
            let _ = sender.send(StreamEvent::Complete(summary)).await;
        });

        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolve_agentic::SubscriptionMatcher;
    use resolve_core::{DirectionHint, LlmProvider, RawTx, ResolveResult, SearchSnippet, SubscriptionCatalog, SubscriptionCatalogEntry, WebSearchProvider};
    use resolve_test_utils::mocks::ScriptedMerchantProvider;

    struct EmptyCatalog;
    #[async_trait::async_trait]
    impl SubscriptionCatalog for EmptyCatalog {
        async fn lookup(&self, _merchant: &str) -> ResolveResult<Vec<SubscriptionCatalogEntry>> {
            Ok(vec![])
        }
        async fn upsert(&self, _entry: SubscriptionCatalogEntry) -> ResolveResult<()> {
            Ok(())
        }
    }
    struct EmptySearch;
    #[async_trait::async_trait]
    impl WebSearchProvider for EmptySearch {
        async fn search(&self, _q: &str, _n: usize) -> ResolveResult<Vec<SearchSnippet>> {
            Ok(vec![])
        }
    }
    struct EmptyLlm;
    #[async_trait::async_trait]
    impl LlmProvider for EmptyLlm {
        async fn complete(&self, _s: &str, _u: &str) -> ResolveResult<String> {
            Ok("{}".to_string())
        }
    }

    fn raw(id: &str, description: &str, amount: f64) -> RawTx {
        RawTx {
            id: Some(id.to_string()),
            description: Some(description.to_string()),
            amount,
            currency: "GBP".to_string(),
            direction: DirectionHint::Debit,
            provider_classification: Vec::new(),
            timestamp: "2024-03-01T00:00:00Z".to_string(),
        }
    }

    fn orchestrator() -> Arc<StreamingOrchestrator<ScriptedMerchantProvider>> {
        // No scripted responses: every description falls through Layer 1's
        // provider-error path, so every transaction needs the agentic queue.
        let merchant_enricher = Arc::new(MerchantEnricher::new(
            Arc::new(ScriptedMerchantProvider::default()),
            4,
            0.80,
            Duration::from_secs(5),
        ));
        let subscription_matcher = Arc::new(SubscriptionMatcher::new(
            Arc::new(EmptyCatalog),
            Arc::new(EmptySearch),
            Arc::new(EmptyLlm),
        ));
        let agentic_workflow = Arc::new(AgenticWorkflow::new(subscription_matcher, Arc::new(EmptyLlm), 0.80));
        Arc::new(StreamingOrchestrator::new(merchant_enricher, agentic_workflow, 0.80, 2))
    }

    /// Spec §4.9's phase sequence names `agentic_enriching` as the phase
    /// after Layer 1 when ids were enqueued; this was previously never
    /// emitted (the stream jumped straight from `enriching` to
    /// `classifying`). Assert it's on the wire.
    #[tokio::test]
    async fn emits_agentic_enriching_phase_when_ids_are_enqueued() {
        let orchestrator = orchestrator();
        let request = EnrichRequest {
            raw_batch: vec![raw("t1", "UNKNOWN MERCHANT LTD", -42.0)],
            user_id: "user-1".into(),
            connection_id: "conn-1".into(),
            holder_name: None,
            country: None,
            mail_grant: None,
        };

        let mut receiver = orchestrator.enrich_stream(request);
        let mut saw_agentic_enriching = false;
        while let Some(event) = receiver.recv().await {
            if let StreamEvent::Progress(progress) = &event {
                if progress.phase == "agentic_enriching" {
                    saw_agentic_enriching = true;
                }
            }
            if matches!(event, StreamEvent::Complete(_)) {
                break;
            }
        }

        assert!(saw_agentic_enriching, "expected an agentic_enriching progress event on the stream");
    }
}
