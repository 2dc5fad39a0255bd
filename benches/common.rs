//! Shared fixtures for the workspace-level benchmarks.

use std::sync::Arc;

use resolve_agentic::{AgenticWorkflow, SubscriptionMatcher};
use resolve_cascade::MerchantEnricher;
use resolve_core::MerchantEnrichmentResponse;
use resolve_test_utils::{raw_tx_batch, FixedSearchProvider, InMemoryCatalog, ScriptedLlmProvider, ScriptedMerchantProvider};

/// Seed for reproducible batch generation.
pub const BENCHMARK_TAU: f64 = 0.80;

/// A batch of `n` raw transactions, each with a distinct description so the
/// scripted merchant provider can answer every one of them.
pub fn raw_batch(n: usize) -> Vec<resolve_core::RawTx> {
    raw_tx_batch(n)
}

/// A merchant provider that answers every description `raw_batch` produces
/// with a fixed, high-confidence response, so Layer 1 settles the whole
/// batch without reaching the agentic queue.
pub fn settled_merchant_provider(n: usize) -> ScriptedMerchantProvider {
    (0..n).fold(ScriptedMerchantProvider::new(), |provider, i| {
        provider.with_response(
            format!("MERCHANT {i}"),
            MerchantEnrichmentResponse {
                counterparty_name: Some(format!("Merchant {i}")),
                logo: None,
                website: None,
                label: "retail".to_string(),
                recurrence: "none".to_string(),
            },
        )
    })
}

/// A `MerchantEnricher` wired to [`settled_merchant_provider`], with
/// `concurrency` concurrent provider calls in flight.
pub fn merchant_enricher(n: usize, concurrency: usize) -> MerchantEnricher<ScriptedMerchantProvider> {
    MerchantEnricher::new(
        Arc::new(settled_merchant_provider(n)),
        concurrency,
        BENCHMARK_TAU,
        std::time::Duration::from_secs(5),
    )
}

/// An `AgenticWorkflow` whose catalog/search/LLM collaborators are all
/// empty/scripted, so every run takes the `sherlock` fallback path
/// deterministically without any wall-clock delay.
pub fn agentic_workflow() -> Arc<AgenticWorkflow> {
    let matcher = Arc::new(SubscriptionMatcher::new(
        Arc::new(InMemoryCatalog::new()),
        Arc::new(FixedSearchProvider::new(vec![])),
        Arc::new(ScriptedLlmProvider::new("{}")),
    ));
    Arc::new(AgenticWorkflow::new(matcher, Arc::new(ScriptedLlmProvider::new("{}")), BENCHMARK_TAU))
}
