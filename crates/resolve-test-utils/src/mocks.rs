//! Deterministic mock implementations of the cascade's external
//! collaborator traits, for use in `resolve-cascade`/`resolve-agentic`/
//! `resolve-runtime`/`resolve-server` integration tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use resolve_core::{
    EmailProvider, LlmProvider, MerchantEnrichmentProvider, MerchantEnrichmentRequest,
    MerchantEnrichmentResponse, ReceiptRecord, ResolveError, ResolveResult, SearchSnippet,
    SubscriptionCatalog, SubscriptionCatalogEntry, WebSearchProvider,
};

/// Merchant enrichment provider that answers from a fixed, description-keyed
/// script. Descriptions not in the script return a `Provider` error, letting
/// tests exercise the Layer-1 fallback path.
#[derive(Default)]
pub struct ScriptedMerchantProvider {
    responses: HashMap<String, MerchantEnrichmentResponse>,
}

impl ScriptedMerchantProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, description: impl Into<String>, response: MerchantEnrichmentResponse) -> Self {
        self.responses.insert(description.into(), response);
        self
    }
}

#[async_trait]
impl MerchantEnrichmentProvider for ScriptedMerchantProvider {
    async fn enrich(&self, request: &MerchantEnrichmentRequest) -> ResolveResult<MerchantEnrichmentResponse> {
        self.responses
            .get(&request.description)
            .cloned()
            .ok_or_else(|| ResolveError::provider(format!("no scripted response for '{}'", request.description)))
    }
}

/// In-memory subscription catalog backed by a `RwLock<Vec<..>>`, matching
/// [`SubscriptionCatalog`]'s case-insensitive substring lookup contract.
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<Vec<SubscriptionCatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(entries: Vec<SubscriptionCatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn snapshot(&self) -> Vec<SubscriptionCatalogEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionCatalog for InMemoryCatalog {
    async fn lookup(&self, merchant: &str) -> ResolveResult<Vec<SubscriptionCatalogEntry>> {
        let needle = merchant.to_lowercase();
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|entry| entry.merchant.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn upsert(&self, entry: SubscriptionCatalogEntry) -> ResolveResult<()> {
        let mut entries = self.entries.write().unwrap();
        let key = entry.key();
        entries.retain(|existing| existing.key() != key);
        entries.push(entry);
        Ok(())
    }
}

/// Web search provider returning a fixed set of snippets regardless of
/// query, or none at all when constructed empty.
#[derive(Default, Clone)]
pub struct FixedSearchProvider {
    snippets: Vec<SearchSnippet>,
}

impl FixedSearchProvider {
    pub fn new(snippets: Vec<SearchSnippet>) -> Self {
        Self { snippets }
    }
}

#[async_trait]
impl WebSearchProvider for FixedSearchProvider {
    async fn search(&self, _query: &str, max_results: usize) -> ResolveResult<Vec<SearchSnippet>> {
        Ok(self.snippets.iter().take(max_results).cloned().collect())
    }
}

/// LLM provider that always returns the same scripted JSON body, for nodes
/// that don't care about the prompt content.
#[derive(Clone)]
pub struct ScriptedLlmProvider {
    response: String,
}

impl ScriptedLlmProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> ResolveResult<String> {
        Ok(self.response.clone())
    }
}

/// LLM provider that always fails, for exercising `reasoning_trace`
/// degrade-gracefully paths.
pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> ResolveResult<String> {
        Err(ResolveError::provider("llm unavailable"))
    }
}

/// Email provider backed by a fixed per-grant receipt list.
#[derive(Default)]
pub struct FixedEmailProvider {
    by_grant: HashMap<String, Vec<ReceiptRecord>>,
}

impl FixedEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receipts(mut self, mail_grant: impl Into<String>, receipts: Vec<ReceiptRecord>) -> Self {
        self.by_grant.insert(mail_grant.into(), receipts);
        self
    }
}

#[async_trait]
impl EmailProvider for FixedEmailProvider {
    async fn fetch_receipts(&self, _user_id: &str, mail_grant: &str) -> ResolveResult<Vec<ReceiptRecord>> {
        Ok(self.by_grant.get(mail_grant).cloned().unwrap_or_default())
    }
}

/// A persistence callback that records every `EnrichedTx` it sees, for
/// assertions in `resolve-runtime`/`resolve-server` tests.
#[derive(Default)]
pub struct RecordingPersistence {
    seen: RwLock<Vec<resolve_core::EnrichedTx>>,
}

impl RecordingPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<resolve_core::EnrichedTx> {
        self.seen.read().unwrap().clone()
    }
}

#[async_trait]
impl resolve_runtime::PersistenceCallback for RecordingPersistence {
    async fn notify(&self, enriched: &resolve_core::EnrichedTx) -> ResolveResult<()> {
        self.seen.write().unwrap().push(enriched.clone());
        Ok(())
    }
}
