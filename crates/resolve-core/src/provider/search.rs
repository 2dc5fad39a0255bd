//! Web-search collaborator used by the subscription matcher (C6) on a
//! catalog miss.

use async_trait::async_trait;

use crate::error::ResolveResult;

/// One organic or knowledge-graph snippet returned by the search provider.
#[derive(Debug, Clone)]
pub struct SearchSnippet {
    pub title: String,
    pub snippet: String,
}

/// Web-search collaborator. §4.6 asks for the top 5 snippets for the query
/// `"{merchant} subscription price {currency} {amount}"`.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> ResolveResult<Vec<SearchSnippet>>;
}
