//! # resolve-runtime
//!
//! Orchestration layer above the cascade and agentic sub-workflow:
//!
//! - [`queue`] — C8, the bounded worker pool that drains transactions
//!   Layer 1 couldn't confidently settle.
//! - [`orchestrator`] — C9, the streaming orchestrator that sequences
//!   normalization, transfer-pair detection, Layer 1, and the C8 queue,
//!   emitting phase-tagged progress events.
//! - [`aggregate`] — C10, the trailing-window budget aggregator.

pub mod aggregate;
pub mod orchestrator;
pub mod queue;

pub use aggregate::*;
pub use orchestrator::*;
pub use queue::*;
