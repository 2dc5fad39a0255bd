//! # resolve-config
//!
//! The enrichment cascade's configuration schema and startup validation.

pub mod schema;

pub use schema::*;
