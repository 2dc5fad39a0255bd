//! The persistence callback (`spec.md` §6): `POST /internal/enrichment-update`
//! on the hosting application once per id on agentic completion. Failures are
//! logged and non-fatal — the enrichment result still flows back to the
//! caller through the normal response/stream.

use async_trait::async_trait;
use resolve_core::EnrichedTx;
use resolve_runtime::PersistenceCallback;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct EnrichmentUpdate<'a> {
    transaction_id: &'a str,
    enrichment_stage: resolve_core::Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    agentic_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrichment_source: Option<resolve_core::Source>,
    is_subscription: bool,
    context_data: &'a std::collections::HashMap<String, serde_json::Value>,
    reasoning_trace: &'a [String],
}

pub struct HttpPersistenceCallback {
    client: reqwest::Client,
    callback_url: String,
}

impl HttpPersistenceCallback {
    pub fn new(hosting_callback_base_url: &str) -> Self {
        let callback_url = format!(
            "{}/internal/enrichment-update",
            hosting_callback_base_url.trim_end_matches('/')
        );
        Self {
            client: reqwest::Client::new(),
            callback_url,
        }
    }
}

#[async_trait]
impl PersistenceCallback for HttpPersistenceCallback {
    async fn notify(&self, enriched: &EnrichedTx) -> resolve_core::ResolveResult<()> {
        let is_subscription = enriched.is_recurring && enriched.recurrence_period.is_some();
        let update = EnrichmentUpdate {
            transaction_id: &enriched.id,
            enrichment_stage: enriched.stage,
            agentic_confidence: enriched.agentic_confidence,
            enrichment_source: enriched.source,
            is_subscription,
            context_data: &enriched.context_data,
            reasoning_trace: &enriched.reasoning_trace,
        };

        match self.client.post(&self.callback_url).json(&update).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                warn!(
                    transaction_id = %enriched.id,
                    status = %response.status(),
                    "persistence callback returned a non-success status"
                );
                Ok(())
            }
            Err(e) => {
                warn!(transaction_id = %enriched.id, error = %e, "persistence callback failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_is_trimmed_and_suffixed() {
        let callback = HttpPersistenceCallback::new("https://app.example.com/");
        assert_eq!(
            callback.callback_url,
            "https://app.example.com/internal/enrichment-update"
        );
    }
}
