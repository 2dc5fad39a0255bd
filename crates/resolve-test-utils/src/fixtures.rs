//! Pre-built fixtures for cascade test suites: raw transaction builders and
//! a handful of ready-made enriched records for assertion-heavy tests.

use chrono::{DateTime, Utc};

use resolve_core::{
    BudgetCategory, DirectionHint, EnrichedTx, Flow, RawTx, ReceiptRecord, Stage,
    TransactionType,
};

/// Builder for [`RawTx`] fixtures, defaulting to a plausible outgoing GBP
/// debit so tests only need to override what they care about.
pub struct RawTxBuilder {
    tx: RawTx,
}

impl Default for RawTxBuilder {
    fn default() -> Self {
        Self {
            tx: RawTx {
                id: None,
                description: Some("TEST MERCHANT LONDON".to_string()),
                amount: 12.50,
                currency: "GBP".to_string(),
                direction: DirectionHint::Debit,
                provider_classification: Vec::new(),
                timestamp: "2024-03-01T09:00:00Z".to_string(),
            },
        }
    }
}

impl RawTxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.tx.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.tx.description = Some(description.into());
        self
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.tx.amount = amount;
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.tx.currency = currency.into();
        self
    }

    pub fn direction(mut self, direction: DirectionHint) -> Self {
        self.tx.direction = direction;
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.tx.timestamp = timestamp.into();
        self
    }

    pub fn provider_classification(mut self, labels: Vec<String>) -> Self {
        self.tx.provider_classification = labels;
        self
    }

    pub fn build(self) -> RawTx {
        self.tx
    }
}

/// A batch of `n` raw transactions with distinct ids, ascending by a day
/// each, useful for exercising batch-chunking behaviour.
pub fn raw_tx_batch(n: usize) -> Vec<RawTx> {
    (0..n)
        .map(|i| {
            RawTxBuilder::new()
                .id(format!("raw-{i}"))
                .description(format!("MERCHANT {i}"))
                .timestamp(format!("2024-03-{:02}T09:00:00Z", (i % 28) + 1))
                .build()
        })
        .collect()
}

/// A settled, high-confidence `EnrichedTx` fixture (Layer 1 only).
pub fn settled_enriched_tx(id: &str, amount_minor: u64, category: BudgetCategory) -> EnrichedTx {
    EnrichedTx {
        id: id.to_string(),
        original_description: "NETFLIX.COM".to_string(),
        merchant_clean_name: Some("Netflix".to_string()),
        merchant_logo: None,
        merchant_site: None,
        labels: vec!["entertainment".to_string()],
        is_recurring: true,
        recurrence_period: Some("monthly".to_string()),
        amount_minor,
        direction: if category == BudgetCategory::Income {
            Flow::Incoming
        } else {
            Flow::Outgoing
        },
        budget_category: category,
        date: "2024-03-01".to_string(),
        ntropy_confidence: 1.0,
        agentic_confidence: None,
        stage: Stage::Complete,
        source: Some(resolve_core::Source::Ntropy),
        reasoning_trace: Vec::new(),
        context_data: Default::default(),
        exclude_from_analysis: category == BudgetCategory::Transfer,
        transaction_type: if category == BudgetCategory::Transfer {
            TransactionType::Transfer
        } else {
            TransactionType::Regular
        },
        linked_transaction_id: None,
    }
}

/// A low-confidence `EnrichedTx` still awaiting the agentic sub-workflow.
pub fn needs_agentic_enriched_tx(id: &str, description: &str, amount_minor: u64) -> EnrichedTx {
    EnrichedTx {
        id: id.to_string(),
        original_description: description.to_string(),
        merchant_clean_name: None,
        merchant_logo: None,
        merchant_site: None,
        labels: vec!["uncategorized".to_string()],
        is_recurring: false,
        recurrence_period: None,
        amount_minor,
        direction: Flow::Outgoing,
        budget_category: BudgetCategory::Discretionary,
        date: "2024-03-01".to_string(),
        ntropy_confidence: 0.3,
        agentic_confidence: None,
        stage: Stage::NtropyDone,
        source: None,
        reasoning_trace: Vec::new(),
        context_data: Default::default(),
        exclude_from_analysis: false,
        transaction_type: TransactionType::Regular,
        linked_transaction_id: None,
    }
}

/// A `ReceiptRecord` fixture with a fixed, easily-asserted-against
/// `received_at`.
pub fn receipt_fixture(id: &str, merchant: &str, amount_minor: u64) -> ReceiptRecord {
    ReceiptRecord {
        id: id.to_string(),
        sender_address: "receipts@merchant.example".to_string(),
        subject: format!("Your receipt from {merchant}"),
        received_at: "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        extracted_merchant: Some(merchant.to_string()),
        extracted_amount_minor: Some(amount_minor),
        currency: "GBP".to_string(),
    }
}
