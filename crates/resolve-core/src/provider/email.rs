//! Email-access collaborator backing receipt ingestion (C7).

use async_trait::async_trait;

use crate::error::ResolveResult;
use crate::models::ReceiptRecord;

/// Retrieves candidate receipts for a user. A `None` mail grant means no
/// receipts are available and the email node records a skip rather than
/// treating it as an error.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn fetch_receipts(
        &self,
        user_id: &str,
        mail_grant: &str,
    ) -> ResolveResult<Vec<ReceiptRecord>>;
}
