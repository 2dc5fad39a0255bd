//! # resolve-agentic
//!
//! Layer 2/3 of the enrichment cascade: the agentic sub-workflow that only
//! runs for transactions Layer 1 could not confidently settle.
//!
//! - [`workflow`] — C5, the fixed-edge typed-state sub-workflow.
//! - [`subscription`] — C6, catalog/web-search/LLM subscription matching.
//! - [`receipts`] — C7, weighted fuzzy receipt matching and greedy
//!   newest-first assignment.

pub mod receipts;
pub mod subscription;
pub mod workflow;

pub use receipts::*;
pub use subscription::*;
pub use workflow::*;
