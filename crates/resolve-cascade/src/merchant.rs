//! C3: the external merchant enrichment provider and its deterministic
//! confidence derivation (Layer 1).

use std::sync::Arc;
use std::time::Duration;

use resolve_core::{
    EnrichedTx, Flow, MerchantEnrichmentProvider, MerchantEnrichmentRequest,
    MerchantEnrichmentResponse, NormTx, ProviderLimiter, Source, Stage, TransactionType,
};
use tracing::{debug, warn};

use crate::classify::classify;

/// Labels considered too generic to earn the "specific label" bonus, and
/// which also contribute to the ambiguity penalty (Open Question (b): the
/// distillation's single list serves both purposes — see DESIGN.md).
pub const GENERIC_LABELS: &[&str] = &[
    "retail",
    "services",
    "general",
    "other",
    "miscellaneous",
    "purchase",
    "payment",
    "transfer",
    "unknown",
    "uncategorized",
];

const MARKETPLACE_MERCHANTS: &[&str] = &["amazon", "paypal", "ebay", "tesco", "walmart", "target"];

/// Payment-processor tokens that mask the true counterparty even after the
/// provider has cleaned the merchant name. `(token, penalty_factor)`.
const DESCRIPTION_PROCESSOR_PENALTIES: &[(&str, f64)] = &[
    ("paypal", 0.5),
    ("amazon", 0.5),
    ("ebay", 0.5),
    ("klarna", 0.6),
    ("clearpay", 0.6),
    ("afterpay", 0.6),
];

/// Outcome of running Layer 1 over one transaction.
pub struct Layer1Result {
    pub enriched: EnrichedTx,
    /// Whether this id must be enqueued to the parallel enrichment queue
    /// because `ntropy_confidence < tau`.
    pub needs_agentic: bool,
}

/// Invokes the merchant enrichment provider across a batch with bounded
/// concurrency, per §5 ("<=10 concurrent provider calls").
pub struct MerchantEnricher<P: MerchantEnrichmentProvider> {
    provider: Arc<P>,
    limiter: ProviderLimiter,
    tau: f64,
    provider_timeout: Duration,
}

impl<P: MerchantEnrichmentProvider + 'static> MerchantEnricher<P> {
    pub fn new(provider: Arc<P>, concurrency: usize, tau: f64, provider_timeout: Duration) -> Self {
        Self {
            provider,
            limiter: ProviderLimiter::new(concurrency),
            tau,
            provider_timeout,
        }
    }

    /// Runs Layer 1 over a batch of up to `layer1_batch_size` transactions,
    /// with up to `concurrency` calls in flight at once.
    pub async fn enrich_batch(&self, batch: &[NormTx]) -> Vec<Layer1Result> {
        let futures = batch.iter().map(|tx| self.enrich_one(tx));
        futures::future::join_all(futures).await
    }

    async fn enrich_one(&self, tx: &NormTx) -> Layer1Result {
        let request = MerchantEnrichmentRequest {
            description: tx.description.clone(),
            amount_minor: tx.amount_minor,
            currency: tx.currency.clone(),
            direction_outgoing: tx.direction.is_outgoing(),
        };

        let _permit = self.limiter.acquire().await;
        let call = self.provider.enrich(&request);
        let outcome = tokio::time::timeout(self.provider_timeout, call).await;

        match outcome {
            Ok(Ok(response)) => self.build_success(tx, response),
            Ok(Err(err)) => {
                warn!(transaction_id = %tx.id, error = %err, "merchant provider returned an error");
                self.build_fallback(tx)
            }
            Err(_) => {
                warn!(transaction_id = %tx.id, "merchant provider call timed out");
                self.build_fallback(tx)
            }
        }
    }

    fn build_success(&self, tx: &NormTx, response: MerchantEnrichmentResponse) -> Layer1Result {
        let confidence = derive_confidence(&response, &tx.description);
        let is_recurring = is_recurring_token(&response.recurrence);
        let flow = if tx.direction.is_outgoing() {
            Flow::Outgoing
        } else {
            Flow::Incoming
        };
        let labels = vec![response.label.clone()];
        let budget_category = classify(&labels, &tx.description, is_recurring, flow);

        let mut enriched = EnrichedTx {
            id: tx.id.clone(),
            original_description: tx.description.clone(),
            merchant_clean_name: response.counterparty_name.clone(),
            merchant_logo: response.logo.clone(),
            merchant_site: response.website.clone(),
            labels,
            is_recurring,
            recurrence_period: if is_recurring {
                Some(response.recurrence.clone())
            } else {
                None
            },
            amount_minor: tx.amount_minor,
            direction: flow,
            budget_category,
            date: tx.date.clone(),
            ntropy_confidence: confidence,
            agentic_confidence: None,
            stage: Stage::NtropyDone,
            source: None,
            reasoning_trace: Vec::new(),
            context_data: Default::default(),
            exclude_from_analysis: false,
            transaction_type: TransactionType::Regular,
            linked_transaction_id: None,
        };
        enriched.push_trace(
            "merchant_enricher",
            format!("provider confidence derived as {confidence:.2}"),
        );

        let needs_agentic = confidence < self.tau;
        if !needs_agentic {
            enriched.source = Some(Source::Ntropy);
        }
        debug!(transaction_id = %tx.id, confidence, needs_agentic, "layer 1 complete");

        Layer1Result {
            enriched,
            needs_agentic,
        }
    }

    fn build_fallback(&self, tx: &NormTx) -> Layer1Result {
        let flow = if tx.direction.is_outgoing() {
            Flow::Outgoing
        } else {
            Flow::Incoming
        };
        let labels = vec!["uncategorized".to_string()];
        let budget_category = classify(&labels, &tx.description, false, flow);

        let mut enriched = EnrichedTx {
            id: tx.id.clone(),
            original_description: tx.description.clone(),
            merchant_clean_name: None,
            merchant_logo: None,
            merchant_site: None,
            labels,
            is_recurring: false,
            recurrence_period: None,
            amount_minor: tx.amount_minor,
            direction: flow,
            budget_category,
            date: tx.date.clone(),
            ntropy_confidence: 0.3,
            agentic_confidence: None,
            stage: Stage::NtropyDone,
            source: None,
            reasoning_trace: Vec::new(),
            context_data: Default::default(),
            exclude_from_analysis: false,
            transaction_type: TransactionType::Regular,
            linked_transaction_id: None,
        };
        enriched.push_trace(
            "merchant_enricher",
            "provider unavailable, fell back to keyword classification",
        );

        Layer1Result {
            enriched,
            needs_agentic: true,
        }
    }
}

fn is_recurring_token(token: &str) -> bool {
    let token = token.trim().to_lowercase();
    !token.is_empty() && token != "none"
}

/// Derives the Layer-1 confidence scalar deterministically, per §4.3.
pub fn derive_confidence(response: &MerchantEnrichmentResponse, original_description: &str) -> f64 {
    let mut confidence: f64 = 0.70;

    let has_name = response
        .counterparty_name
        .as_ref()
        .map(|n| n.trim().len() >= 3)
        .unwrap_or(false);
    if has_name {
        confidence += 0.10;
    }

    let label_lower = response.label.to_lowercase();
    let label_is_generic = GENERIC_LABELS.contains(&label_lower.as_str());
    if !label_is_generic {
        confidence += 0.10;
    }

    if is_recurring_token(&response.recurrence) {
        confidence += 0.10;
    }

    confidence = confidence.min(1.0);

    let penalty = ambiguity_penalty(response, original_description, label_is_generic);
    (confidence * penalty).clamp(0.0, 1.0)
}

/// Smallest (most severe) ambiguity-penalty factor that applies, per §4.3.
fn ambiguity_penalty(
    response: &MerchantEnrichmentResponse,
    original_description: &str,
    label_is_generic: bool,
) -> f64 {
    let mut smallest = 1.0_f64;

    if let Some(name) = &response.counterparty_name {
        let name_lower = name.to_lowercase();
        if MARKETPLACE_MERCHANTS
            .iter()
            .any(|m| name_lower.contains(m))
        {
            smallest = smallest.min(0.5);
        }
    }

    let label_lower = response.label.to_lowercase();
    if label_lower == "unknown" || label_lower == "uncategorized" {
        smallest = smallest.min(0.3);
    } else if label_is_generic {
        smallest = smallest.min(0.6);
    }

    let description_lower = original_description.to_lowercase();
    for (token, factor) in DESCRIPTION_PROCESSOR_PENALTIES {
        if description_lower.contains(token) {
            smallest = smallest.min(*factor);
        }
    }

    smallest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(name: Option<&str>, label: &str, recurrence: &str) -> MerchantEnrichmentResponse {
        MerchantEnrichmentResponse {
            counterparty_name: name.map(String::from),
            logo: None,
            website: None,
            label: label.to_string(),
            recurrence: recurrence.to_string(),
        }
    }

    #[test]
    fn paypal_penalty_scenario_from_spec() {
        let resp = response(Some("Uber"), "transport", "none");
        let confidence = derive_confidence(&resp, "PAYPAL *UBERTRIP");
        assert!((confidence - 0.45).abs() < 1e-9, "got {confidence}");
    }

    #[test]
    fn netflix_subscription_scenario_from_spec() {
        let resp = response(Some("Netflix"), "entertainment", "monthly");
        let confidence = derive_confidence(&resp, "NETFLIX.COM");
        assert!((confidence - 1.0).abs() < 1e-9, "got {confidence}");
    }

    #[test]
    fn unknown_label_applies_0_3_penalty() {
        let resp = response(Some("Mystery Co"), "unknown", "none");
        let confidence = derive_confidence(&resp, "MYSTERY CO PURCHASE");
        assert!((confidence - (0.80 * 0.3)).abs() < 1e-9, "got {confidence}");
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let resp = response(Some("Specific Gym Ltd"), "fitness", "monthly");
        let confidence = derive_confidence(&resp, "SPECIFIC GYM LTD");
        assert!(confidence <= 1.0);
    }
}
