//! Shared server state: the wired-up cascade plus the agentic job store.

use std::collections::HashMap;
use std::sync::Arc;

use resolve_agentic::AgenticWorkflow;
use resolve_cascade::MerchantEnricher;
use resolve_config::EnrichmentConfig;
use resolve_core::{EnrichmentJob, MerchantEnrichmentProvider};
use resolve_runtime::StreamingOrchestrator;
use tokio::sync::Mutex;

use crate::providers::HttpMerchantProvider;

/// The concrete merchant-enrichment provider this binary runs with. The
/// cascade crates are generic over the provider trait; the server picks one
/// implementation to instantiate the whole pipeline with, and test suites
/// substitute a mock to avoid live HTTP calls.
pub type Orchestrator = StreamingOrchestrator<HttpMerchantProvider>;

/// In-memory table backing the agentic job API (`POST /api/enrich`,
/// `GET /api/enrich/{job_id}`). A job lives only as long as the process —
/// restarting the server loses in-flight jobs, matching the "no physical
/// store mandated" note in `spec.md` §6.
pub type JobStore = Arc<Mutex<HashMap<String, EnrichmentJob>>>;

/// Shared state every handler receives, generic over the merchant-enrichment
/// provider `P` so integration tests can plug in a scripted provider instead
/// of `HttpMerchantProvider` without duplicating the router or handlers.
pub struct AppState<P: MerchantEnrichmentProvider + 'static = HttpMerchantProvider> {
    pub orchestrator: Arc<StreamingOrchestrator<P>>,
    pub merchant_enricher: Arc<MerchantEnricher<P>>,
    pub agentic_workflow: Arc<AgenticWorkflow>,
    pub config: EnrichmentConfig,
    pub jobs: JobStore,
}

impl<P: MerchantEnrichmentProvider + 'static> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            merchant_enricher: Arc::clone(&self.merchant_enricher),
            agentic_workflow: Arc::clone(&self.agentic_workflow),
            config: self.config.clone(),
            jobs: Arc::clone(&self.jobs),
        }
    }
}
