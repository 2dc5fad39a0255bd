//! # resolve-server
//!
//! REST/SSE front door for the transaction enrichment cascade: wires
//! [`resolve_runtime::StreamingOrchestrator`] up to HTTP, with thin
//! JSON-over-HTTP adapters standing in for the out-of-scope external
//! collaborators (merchant enrichment, web search, LLM completion, email
//! receipts), an in-memory subscription catalog, and a best-effort
//! persistence callback.
//!
//! - [`state`] — shared `AppState` the router hands to every endpoint.
//! - [`providers`] — HTTP adapters for the four collaborator traits.
//! - [`catalog`] — in-memory `SubscriptionCatalog`.
//! - [`persistence`] — HTTP persistence callback.
//! - [`rest`] — request/response payloads, handlers, and router assembly.

pub mod catalog;
pub mod persistence;
pub mod providers;
pub mod rest;
pub mod state;

pub use rest::build_router;
pub use state::AppState;
