//! Raw aggregator-delivered transaction record, the cascade's sole input type.

use serde::{Deserialize, Serialize};

/// Direction hint as delivered by the open-banking aggregator.
///
/// Carried forward verbatim (uppercased) onto `NormTx::direction`; the
/// cascade only collapses it into `incoming`/`outgoing` once an `EnrichedTx`
/// is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionHint {
    Credit,
    Debit,
    StandingOrder,
    DirectDebit,
    Fee,
}

impl DirectionHint {
    /// True for the directions that represent money leaving the account.
    pub fn is_outgoing(self) -> bool {
        !matches!(self, Self::Credit)
    }
}

/// A raw bank-transaction record as delivered by the open-banking aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTx {
    /// Aggregator-assigned identifier. May be absent from malformed feeds.
    #[serde(default)]
    pub id: Option<String>,
    /// Free-text transaction description.
    #[serde(default)]
    pub description: Option<String>,
    /// Signed amount in major units (e.g. pounds, not pence); negative for
    /// outgoing money when the aggregator encodes sign rather than direction.
    pub amount: f64,
    /// ISO 4217 currency code. Defaults to GBP when absent.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Aggregator's direction classification.
    pub direction: DirectionHint,
    /// Optional provider-supplied classification labels (category hints).
    #[serde(default)]
    pub provider_classification: Vec<String>,
    /// ISO-8601 timestamp (may carry time-of-day; only the date is kept).
    pub timestamp: String,
}

fn default_currency() -> String {
    "GBP".to_string()
}
