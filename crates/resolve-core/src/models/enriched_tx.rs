//! The cascade's terminal output record and its supporting enums.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cash-flow direction of a fully enriched transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Incoming,
    Outgoing,
}

/// Budget bucket a transaction is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Debt,
    Fixed,
    Discretionary,
    Income,
    Transfer,
}

/// Monotonically advancing cascade stage token.
///
/// Valid transitions: `Pending -> NtropyDone -> (AgenticQueued ->
/// AgenticProcessing -> AgenticDone) | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    NtropyDone,
    AgenticQueued,
    AgenticProcessing,
    AgenticDone,
    Complete,
    Failed,
}

impl Stage {
    /// Whether `enqueue` would accept a transaction currently at this stage
    /// (C8's idempotency rule: only `Pending` or `NtropyDone`).
    pub fn is_enqueueable(self) -> bool {
        matches!(self, Self::Pending | Self::NtropyDone)
    }
}

/// Which layer ultimately produced the winning confidence/category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Layer 0, the deterministic transfer-pair detector.
    MathBrain,
    /// Layer 1, the external merchant enrichment provider.
    Ntropy,
    /// Layer 2, subscription or receipt matching.
    ContextHunter,
    /// Layer 3, the LLM fallback.
    Sherlock,
}

/// Classification of the transaction itself, distinct from its budget
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Regular,
    Transfer,
    Refund,
}

/// The cascade's output: a categorised, merchant-identified,
/// recurrence-aware record suitable for budget analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedTx {
    pub id: String,
    pub original_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_clean_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_site: Option<String>,
    pub labels: Vec<String>,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_period: Option<String>,
    pub amount_minor: u64,
    pub direction: Flow,
    pub budget_category: BudgetCategory,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub ntropy_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentic_confidence: Option<f64>,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub reasoning_trace: Vec<String>,
    #[serde(default)]
    pub context_data: HashMap<String, serde_json::Value>,
    pub exclude_from_analysis: bool,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_transaction_id: Option<String>,
}

impl EnrichedTx {
    /// `needs_review` per §4.5/§7: the final confidence (agentic if present,
    /// else Layer-1) is below τ.
    pub fn needs_review(&self, tau: f64) -> bool {
        self.final_confidence() < tau
    }

    /// The confidence that should be treated as authoritative: the agentic
    /// confidence once Layers 2-3 have run, otherwise the Layer-1 confidence.
    pub fn final_confidence(&self) -> f64 {
        self.agentic_confidence.unwrap_or(self.ntropy_confidence)
    }

    /// Appends a `"[step] detail"` entry to the reasoning trace, matching the
    /// original implementation's labelled trace steps while keeping the
    /// simpler `Vec<String>` shape the teacher's domain models prefer.
    pub fn push_trace(&mut self, step: &str, detail: impl AsRef<str>) {
        self.reasoning_trace
            .push(format!("[{step}] {}", detail.as_ref()));
    }
}
