//! Agentic job-queue record backing the `/api/enrich` polling API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::enriched_tx::EnrichedTx;

/// Lifecycle status of an `EnrichmentJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Tracks a batch of transaction ids submitted to the agentic job API,
/// filling in as the parallel enrichment queue drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub id: String,
    pub transaction_ids: Vec<String>,
    pub completed: usize,
    pub total: usize,
    pub results: Vec<EnrichedTx>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrichmentJob {
    /// Creates a freshly submitted job in `Pending` status.
    pub fn new(id: impl Into<String>, transaction_ids: Vec<String>, now: DateTime<Utc>) -> Self {
        let total = transaction_ids.len();
        Self {
            id: id.into(),
            transaction_ids,
            completed: 0,
            total,
            results: Vec::new(),
            status: JobStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Records one more completed result, streaming partial results as they
    /// arrive rather than only at job completion.
    pub fn push_result(&mut self, result: EnrichedTx) {
        self.results.push(result);
        self.completed = self.results.len();
    }

    /// Marks the job as finished: `Completed` if every id produced a result,
    /// `Failed` otherwise.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.status = if self.completed >= self.total {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enriched_tx::{BudgetCategory, Flow, Stage, TransactionType};
    use std::collections::HashMap;

    fn dummy_result(id: &str) -> EnrichedTx {
        EnrichedTx {
            id: id.to_string(),
            original_description: String::new(),
            merchant_clean_name: None,
            merchant_logo: None,
            merchant_site: None,
            labels: Vec::new(),
            is_recurring: false,
            recurrence_period: None,
            amount_minor: 100,
            direction: Flow::Outgoing,
            budget_category: BudgetCategory::Discretionary,
            date: "2024-01-01".into(),
            ntropy_confidence: 0.5,
            agentic_confidence: None,
            stage: Stage::AgenticDone,
            source: None,
            reasoning_trace: Vec::new(),
            context_data: HashMap::new(),
            exclude_from_analysis: false,
            transaction_type: TransactionType::Regular,
            linked_transaction_id: None,
        }
    }

    #[test]
    fn finish_marks_completed_when_every_id_has_a_result() {
        let now = Utc::now();
        let mut job = EnrichmentJob::new("job1", vec!["a".into(), "b".into()], now);
        job.push_result(dummy_result("a"));
        job.push_result(dummy_result("b"));
        job.finish(now);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed, 2);
    }

    #[test]
    fn finish_marks_failed_when_incomplete() {
        let now = Utc::now();
        let mut job = EnrichmentJob::new("job2", vec!["a".into(), "b".into()], now);
        job.push_result(dummy_result("a"));
        job.finish(now);
        assert_eq!(job.status, JobStatus::Failed);
    }
}
