//! Thin HTTP adapters over the four external collaborator traits
//! (`resolve_core::provider`). The cascade only ever sees the trait; this
//! module is the one place that knows there's a real HTTP call behind it.
//!
//! Wire formats for Ntropy, Serper, Claude, and Nylas are out of scope (see
//! `SPEC_FULL.md` §12) — each adapter POSTs the request struct as JSON to a
//! configured endpoint and expects the response struct back as JSON. A
//! hosting deployment that speaks a provider's real wire format fronts the
//! configured URL with a small translating proxy.

use std::time::Duration;

use async_trait::async_trait;
use resolve_core::{
    EmailProvider, LlmProvider, MerchantEnrichmentProvider, MerchantEnrichmentRequest,
    MerchantEnrichmentResponse, ReceiptRecord, ResolveError, ResolveResult, SearchSnippet,
    WebSearchProvider,
};
use serde::{Deserialize, Serialize};

/// Shared plumbing for every HTTP-backed provider adapter: a client, a base
/// endpoint, and the per-call timeout from `EnrichmentConfig`.
struct HttpCollaborator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCollaborator {
    fn new(endpoint: String, timeout: Duration) -> ResolveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        body: &Req,
    ) -> ResolveResult<Resp> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| ResolveError::provider(format!("request to {} failed: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            return Err(ResolveError::provider(format!(
                "{} returned status {}",
                self.endpoint,
                response.status()
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ResolveError::provider(format!("malformed response from {}: {e}", self.endpoint)))
    }
}

/// Merchant/category enrichment (Layer 1), e.g. an Ntropy-shaped endpoint.
pub struct HttpMerchantProvider {
    collaborator: HttpCollaborator,
}

impl HttpMerchantProvider {
    pub fn new(endpoint: String, timeout: Duration) -> ResolveResult<Self> {
        Ok(Self {
            collaborator: HttpCollaborator::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl MerchantEnrichmentProvider for HttpMerchantProvider {
    async fn enrich(&self, request: &MerchantEnrichmentRequest) -> ResolveResult<MerchantEnrichmentResponse> {
        #[derive(Serialize)]
        struct Body<'a> {
            description: &'a str,
            amount_minor: u64,
            currency: &'a str,
            direction_outgoing: bool,
        }
        self.collaborator
            .post_json(&Body {
                description: &request.description,
                amount_minor: request.amount_minor,
                currency: &request.currency,
                direction_outgoing: request.direction_outgoing,
            })
            .await
    }
}

/// Web search fallback used by the subscription matcher on a catalog miss.
pub struct HttpSearchProvider {
    collaborator: HttpCollaborator,
}

impl HttpSearchProvider {
    pub fn new(endpoint: String, timeout: Duration) -> ResolveResult<Self> {
        Ok(Self {
            collaborator: HttpCollaborator::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl WebSearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> ResolveResult<Vec<SearchSnippet>> {
        #[derive(Serialize)]
        struct Body<'a> {
            query: &'a str,
            max_results: usize,
        }
        #[derive(Deserialize)]
        struct Snippet {
            title: String,
            snippet: String,
        }
        let snippets: Vec<Snippet> = self
            .collaborator
            .post_json(&Body { query, max_results })
            .await?;
        Ok(snippets
            .into_iter()
            .map(|s| SearchSnippet {
                title: s.title,
                snippet: s.snippet,
            })
            .collect())
    }
}

/// LLM completion used by the subscription matcher and the Sherlock node.
pub struct HttpLlmProvider {
    collaborator: HttpCollaborator,
}

impl HttpLlmProvider {
    pub fn new(endpoint: String, timeout: Duration) -> ResolveResult<Self> {
        Ok(Self {
            collaborator: HttpCollaborator::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> ResolveResult<String> {
        #[derive(Serialize)]
        struct Body<'a> {
            system_prompt: &'a str,
            user_prompt: &'a str,
        }
        #[derive(Deserialize)]
        struct Completion {
            text: String,
        }
        let completion: Completion = self
            .collaborator
            .post_json(&Body {
                system_prompt,
                user_prompt,
            })
            .await?;
        Ok(completion.text)
    }
}

/// Receipt lookup backing the email-receipt node.
pub struct HttpEmailProvider {
    collaborator: HttpCollaborator,
}

impl HttpEmailProvider {
    pub fn new(endpoint: String, timeout: Duration) -> ResolveResult<Self> {
        Ok(Self {
            collaborator: HttpCollaborator::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn fetch_receipts(&self, user_id: &str, mail_grant: &str) -> ResolveResult<Vec<ReceiptRecord>> {
        #[derive(Serialize)]
        struct Body<'a> {
            user_id: &'a str,
            mail_grant: &'a str,
        }
        self.collaborator
            .post_json(&Body { user_id, mail_grant })
            .await
    }
}
