//! Subscription catalog entries (C6), shared-read, written only through the
//! subscription matcher.

use serde::{Deserialize, Serialize};

/// A known recurring charge, keyed by `(lower(merchant), lower(product),
/// amount_minor)`.
///
/// Created by the seed script or by Layer 2 when the LLM returns confidence
/// `>= 0.9`; read-only everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCatalogEntry {
    pub merchant: String,
    pub product_name: String,
    pub amount_minor: u64,
    pub currency: String,
    pub recurrence: String,
    pub category: String,
    pub verified: bool,
    pub confidence: f64,
}

impl SubscriptionCatalogEntry {
    /// The composite unique key, case-folded per the storage schema.
    pub fn key(&self) -> (String, String, u64) {
        (
            self.merchant.to_lowercase(),
            self.product_name.to_lowercase(),
            self.amount_minor,
        )
    }

    /// Effective confidence for a catalog hit: 1.0 when verified, else the
    /// entry's stored score.
    pub fn hit_confidence(&self) -> f64 {
        if self.verified {
            1.0
        } else {
            self.confidence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_case_folds_merchant_and_product() {
        let entry = SubscriptionCatalogEntry {
            merchant: "Netflix".into(),
            product_name: "Standard".into(),
            amount_minor: 1099,
            currency: "GBP".into(),
            recurrence: "monthly".into(),
            category: "entertainment".into(),
            verified: true,
            confidence: 1.0,
        };
        assert_eq!(
            entry.key(),
            ("netflix".to_string(), "standard".to_string(), 1099)
        );
        assert_eq!(entry.hit_confidence(), 1.0);
    }

    #[test]
    fn unverified_hit_confidence_uses_stored_score() {
        let entry = SubscriptionCatalogEntry {
            merchant: "Gymbox".into(),
            product_name: "Membership".into(),
            amount_minor: 4500,
            currency: "GBP".into(),
            recurrence: "monthly".into(),
            category: "fitness".into(),
            verified: false,
            confidence: 0.82,
        };
        assert_eq!(entry.hit_confidence(), 0.82);
    }
}
