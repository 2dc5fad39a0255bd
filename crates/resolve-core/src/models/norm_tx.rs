//! Canonical intermediate transaction form produced by the normaliser (C1).

use serde::{Deserialize, Serialize};

use crate::models::raw_tx::DirectionHint;

/// A normalised transaction: absolute integer minor units, a date-only
/// timestamp, and an uppercased direction token.
///
/// Invariants: `amount_minor >= 0`; `date` is a parseable `YYYY-MM-DD`
/// string; `id` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormTx {
    pub id: String,
    pub description: String,
    pub amount_minor: u64,
    pub currency: String,
    pub direction: DirectionHint,
    pub provider_classification: Vec<String>,
    /// `YYYY-MM-DD`.
    pub date: String,
}

impl NormTx {
    /// Parses `date` into a `chrono::NaiveDate`, assuming the invariant that
    /// it is always exactly 10 characters of `YYYY-MM-DD`.
    pub fn parsed_date(&self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}
