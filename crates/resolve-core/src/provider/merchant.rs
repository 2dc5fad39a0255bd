//! Layer 1's external merchant-enrichment provider (C3).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResolveResult;

/// What the merchant enricher sends per transaction.
#[derive(Debug, Clone)]
pub struct MerchantEnrichmentRequest {
    pub description: String,
    pub amount_minor: u64,
    pub currency: String,
    pub direction_outgoing: bool,
}

/// The fields the cascade reads back, per §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantEnrichmentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// A single general category label (e.g. "transport", "retail").
    pub label: String,
    /// Recurrence token, e.g. "monthly", "none".
    pub recurrence: String,
}

/// The external merchant/category enrichment collaborator.
#[async_trait]
pub trait MerchantEnrichmentProvider: Send + Sync {
    async fn enrich(
        &self,
        request: &MerchantEnrichmentRequest,
    ) -> ResolveResult<MerchantEnrichmentResponse>;
}
