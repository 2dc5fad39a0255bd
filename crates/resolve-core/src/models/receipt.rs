//! Email-receipt records matched against transactions by C7.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A receipt ingested from the mail collaborator.
///
/// Created by ingestion; attached to a transaction once a match is accepted
/// by the receipt matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: String,
    pub sender_address: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_merchant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_amount_minor: Option<u64>,
    pub currency: String,
}
