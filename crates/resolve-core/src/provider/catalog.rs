//! Subscription catalog storage (C6): case-insensitive merchant lookup plus
//! last-writer-wins upsert on the composite key.

use async_trait::async_trait;

use crate::error::ResolveResult;
use crate::models::SubscriptionCatalogEntry;

/// Persistence collaborator for the subscription catalog. Implementations
/// decide their own storage; the matcher only needs lookup-by-merchant and
/// upsert.
#[async_trait]
pub trait SubscriptionCatalog: Send + Sync {
    /// All entries whose merchant contains `merchant` case-insensitively.
    async fn lookup(&self, merchant: &str) -> ResolveResult<Vec<SubscriptionCatalogEntry>>;

    /// Writes the entry, replacing any existing row on the same composite
    /// key (merchant, product, amount_minor).
    async fn upsert(&self, entry: SubscriptionCatalogEntry) -> ResolveResult<()>;
}
