//! # resolve-core
//!
//! Domain model, error taxonomy, streaming primitives, and provider traits for
//! the transaction enrichment cascade.
//!
//! This crate provides the foundational types shared by every cascade stage:
//! - Raw/normalised/enriched transaction records and their supporting types
//! - The ghost-pair, subscription-catalog, receipt, and enrichment-job records
//! - A `thiserror`-based error taxonomy (`ResolveError`)
//! - Streaming events, progress snapshots, and cooperative cancellation
//! - Async trait interfaces for the external collaborators (merchant
//!   enrichment, web search, LLM, email) referenced only at their interfaces

pub mod error;
pub mod models;
pub mod provider;
pub mod rate_limit;
pub mod streaming;

pub use error::*;
pub use models::*;
pub use provider::*;
pub use rate_limit::*;
pub use streaming::*;
