//! Process-local subscription catalog. `spec.md` §6 describes the storage
//! schema logically (a table keyed by `(lower(merchant), lower(product_name),
//! amount_minor)`) without mandating a physical store; this in-memory
//! implementation is that table for a single server process, following the
//! composite-key last-writer-wins rule from Design Notes §9.

use std::sync::RwLock;

use async_trait::async_trait;
use resolve_core::{ResolveResult, SubscriptionCatalog, SubscriptionCatalogEntry};

pub struct InMemorySubscriptionCatalog {
    entries: RwLock<Vec<SubscriptionCatalogEntry>>,
}

impl InMemorySubscriptionCatalog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn seeded(entries: Vec<SubscriptionCatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl Default for InMemorySubscriptionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionCatalog for InMemorySubscriptionCatalog {
    async fn lookup(&self, merchant: &str) -> ResolveResult<Vec<SubscriptionCatalogEntry>> {
        let needle = merchant.to_lowercase();
        let entries = self.entries.read().expect("catalog lock poisoned");
        Ok(entries
            .iter()
            .filter(|e| e.merchant.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn upsert(&self, entry: SubscriptionCatalogEntry) -> ResolveResult<()> {
        let mut entries = self.entries.write().expect("catalog lock poisoned");
        entries.retain(|existing| existing.key() != entry.key());
        entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(merchant: &str, amount_minor: u64) -> SubscriptionCatalogEntry {
        SubscriptionCatalogEntry {
            merchant: merchant.to_string(),
            product_name: "Standard".into(),
            amount_minor,
            currency: "GBP".into(),
            recurrence: "monthly".into(),
            category: "entertainment".into(),
            verified: true,
            confidence: 1.0,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_same_composite_key() {
        let catalog = InMemorySubscriptionCatalog::new();
        catalog.upsert(entry("Netflix", 1099)).await.unwrap();
        let mut updated = entry("Netflix", 1099);
        updated.confidence = 0.5;
        updated.verified = false;
        catalog.upsert(updated).await.unwrap();

        let hits = catalog.lookup("netflix").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].verified);
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_substring_match() {
        let catalog = InMemorySubscriptionCatalog::seeded(vec![entry("Netflix", 1099)]);
        assert_eq!(catalog.lookup("NET").await.unwrap().len(), 1);
        assert_eq!(catalog.lookup("spotify").await.unwrap().len(), 0);
    }
}
