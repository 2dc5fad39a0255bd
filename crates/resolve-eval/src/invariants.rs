//! Universal-invariant checks over a completed enrichment batch, per §8.
//!
//! Each check is independent and non-fatal: a violation is recorded rather
//! than aborting the pass, so a single bad record doesn't hide every other
//! finding.

use std::collections::{HashMap, HashSet};

use resolve_core::{BudgetCategory, EnrichedTx, Source, Stage};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One broken invariant, identified by name and the transaction(s) involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub invariant: String,
    pub transaction_ids: Vec<String>,
    pub detail: String,
}

impl InvariantViolation {
    fn new(invariant: &str, transaction_ids: Vec<String>, detail: impl Into<String>) -> Self {
        Self {
            invariant: invariant.to_string(),
            transaction_ids,
            detail: detail.into(),
        }
    }
}

/// Runs every universal invariant from spec.md §8 over `batch` and returns
/// every violation found. An empty result means the batch is clean.
pub fn check_universal_invariants(batch: &[EnrichedTx], tau: f64) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    violations.extend(check_unique_ids(batch));
    violations.extend(check_amount_and_date_shape(batch));
    violations.extend(check_confidence_bounds(batch));
    violations.extend(check_stage_order(batch));
    violations.extend(check_transfer_pairs_linked(batch));
    violations.extend(check_cascade_short_circuit(batch, tau));

    if !violations.is_empty() {
        warn!(count = violations.len(), batch_size = batch.len(), "universal invariant violations found");
    }
    violations
}

/// Exactly one `EnrichedTx` per id: no duplicates, no missing ids relative
/// to what the caller expected (checked by the caller comparing batch sizes;
/// here we only check for accidental duplication within the output).
fn check_unique_ids(batch: &[EnrichedTx]) -> Vec<InvariantViolation> {
    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for tx in batch {
        if !seen.insert(tx.id.clone()) {
            violations.push(InvariantViolation::new(
                "unique_ids",
                vec![tx.id.clone()],
                "id appears more than once in the output batch",
            ));
        }
    }
    violations
}

fn check_amount_and_date_shape(batch: &[EnrichedTx]) -> Vec<InvariantViolation> {
    batch
        .iter()
        .filter_map(|tx| {
            if tx.date.len() != 10 {
                Some(InvariantViolation::new(
                    "date_shape",
                    vec![tx.id.clone()],
                    format!("date '{}' is not 10 characters", tx.date),
                ))
            } else {
                None
            }
        })
        .collect()
}

fn check_confidence_bounds(batch: &[EnrichedTx]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for tx in batch {
        if !(0.0..=1.0).contains(&tx.ntropy_confidence) {
            violations.push(InvariantViolation::new(
                "confidence_bounds",
                vec![tx.id.clone()],
                format!("ntropy_confidence {} outside [0,1]", tx.ntropy_confidence),
            ));
        }
        if let Some(agentic) = tx.agentic_confidence {
            if !(0.0..=1.0).contains(&agentic) {
                violations.push(InvariantViolation::new(
                    "confidence_bounds",
                    vec![tx.id.clone()],
                    format!("agentic_confidence {agentic} outside [0,1]"),
                ));
            }
        }
    }
    violations
}

/// `stage` only ever advances through `pending -> ntropy_done ->
/// (agentic_queued -> agentic_processing -> agentic_done) | failed`. A
/// batch only ever observes the terminal stage per transaction, so this
/// checks that the observed terminal stage is one of the valid end states.
fn check_stage_order(batch: &[EnrichedTx]) -> Vec<InvariantViolation> {
    batch
        .iter()
        .filter_map(|tx| {
            let valid = matches!(
                tx.stage,
                Stage::AgenticDone | Stage::Complete | Stage::Failed | Stage::NtropyDone
            );
            if valid {
                None
            } else {
                Some(InvariantViolation::new(
                    "stage_order",
                    vec![tx.id.clone()],
                    format!("terminal stage {:?} is not a valid end state", tx.stage),
                ))
            }
        })
        .collect()
}

fn check_transfer_pairs_linked(batch: &[EnrichedTx]) -> Vec<InvariantViolation> {
    let by_id: HashMap<&str, &EnrichedTx> = batch.iter().map(|tx| (tx.id.as_str(), tx)).collect();
    let mut violations = Vec::new();

    for tx in batch {
        if tx.budget_category != BudgetCategory::Transfer {
            continue;
        }
        let Some(peer_id) = &tx.linked_transaction_id else {
            violations.push(InvariantViolation::new(
                "transfer_pair_linked",
                vec![tx.id.clone()],
                "transfer record has no linked_transaction_id",
            ));
            continue;
        };
        let Some(peer) = by_id.get(peer_id.as_str()) else {
            violations.push(InvariantViolation::new(
                "transfer_pair_linked",
                vec![tx.id.clone(), peer_id.clone()],
                "linked peer is not present in the output batch",
            ));
            continue;
        };
        if peer.amount_minor != tx.amount_minor {
            violations.push(InvariantViolation::new(
                "transfer_pair_linked",
                vec![tx.id.clone(), peer_id.clone()],
                "linked peer amount does not match",
            ));
        }
        if peer.direction == tx.direction {
            violations.push(InvariantViolation::new(
                "transfer_pair_linked",
                vec![tx.id.clone(), peer_id.clone()],
                "linked peer has the same direction",
            ));
        }
        if let (Some(a), Some(b)) = (parsed_date(&tx.date), parsed_date(&peer.date)) {
            if (a - b).num_days().abs() > 2 {
                violations.push(InvariantViolation::new(
                    "transfer_pair_linked",
                    vec![tx.id.clone(), peer_id.clone()],
                    "linked peer date difference exceeds 2 days",
                ));
            }
        }
    }
    violations
}

/// If `ntropy_confidence >= tau` then `source = ntropy` and
/// `agentic_confidence` is absent or equal to `ntropy_confidence`.
fn check_cascade_short_circuit(batch: &[EnrichedTx], tau: f64) -> Vec<InvariantViolation> {
    batch
        .iter()
        .filter(|tx| tx.ntropy_confidence >= tau && tx.source != Some(Source::MathBrain))
        .filter_map(|tx| {
            let source_ok = tx.source == Some(Source::Ntropy);
            let agentic_ok = tx
                .agentic_confidence
                .map(|a| a == tx.ntropy_confidence)
                .unwrap_or(true);
            if source_ok && agentic_ok {
                None
            } else {
                Some(InvariantViolation::new(
                    "cascade_short_circuit",
                    vec![tx.id.clone()],
                    format!(
                        "confidence {} >= tau but source={:?}, agentic_confidence={:?}",
                        tx.ntropy_confidence, tx.source, tx.agentic_confidence
                    ),
                ))
            }
        })
        .collect()
}

fn parsed_date(date: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolve_core::{Flow, TransactionType};

    fn base(id: &str) -> EnrichedTx {
        EnrichedTx {
            id: id.to_string(),
            original_description: "x".into(),
            merchant_clean_name: None,
            merchant_logo: None,
            merchant_site: None,
            labels: vec![],
            is_recurring: false,
            recurrence_period: None,
            amount_minor: 5000,
            direction: Flow::Outgoing,
            budget_category: BudgetCategory::Transfer,
            date: "2024-01-10".into(),
            ntropy_confidence: 1.0,
            agentic_confidence: None,
            stage: Stage::Complete,
            source: Some(Source::MathBrain),
            reasoning_trace: vec![],
            context_data: Default::default(),
            exclude_from_analysis: true,
            transaction_type: TransactionType::Transfer,
            linked_transaction_id: None,
        }
    }

    #[test]
    fn clean_ghost_pair_has_no_violations() {
        let mut a = base("a");
        let mut b = base("b");
        b.direction = Flow::Incoming;
        b.date = "2024-01-11".into();
        a.linked_transaction_id = Some("b".into());
        b.linked_transaction_id = Some("a".into());

        let violations = check_transfer_pairs_linked(&[a, b]);
        assert!(violations.is_empty());
    }

    #[test]
    fn unlinked_transfer_is_flagged() {
        let tx = base("a");
        let violations = check_transfer_pairs_linked(&[tx]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, "transfer_pair_linked");
    }

    #[test]
    fn duplicate_ids_are_flagged() {
        let violations = check_unique_ids(&[base("a"), base("a")]);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn high_confidence_wrong_source_is_flagged() {
        let mut tx = base("a");
        tx.budget_category = BudgetCategory::Discretionary;
        tx.source = Some(Source::Sherlock);
        let violations = check_cascade_short_circuit(&[tx], 0.80);
        assert_eq!(violations.len(), 1);
    }
}
