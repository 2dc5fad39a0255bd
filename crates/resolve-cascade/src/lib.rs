//! # resolve-cascade
//!
//! Layer 0 and Layer 1 of the enrichment cascade: the deterministic stages
//! that run before any transaction is considered for the agentic
//! sub-workflow.
//!
//! - [`normalize`] — C1, raw aggregator records to canonical `NormTx`.
//! - [`transfer_pairs`] — C2, internal-transfer detection (Layer 0).
//! - [`merchant`] — C3, external merchant enrichment with derived confidence
//!   (Layer 1).
//! - [`classify`] — C4, the ordered-keyword budget classifier.

pub mod classify;
pub mod merchant;
pub mod normalize;
pub mod transfer_pairs;

pub use classify::*;
pub use merchant::*;
pub use normalize::*;
pub use transfer_pairs::*;
