//! C2: deterministic internal-transfer detection (Layer 0).
//!
//! Runs once per batch, before Layer 1. Transactions tagged as transfers
//! here MUST NOT be processed by Layer 1 (§4.2).

use std::collections::{HashMap, HashSet};

use resolve_core::{
    BudgetCategory, EnrichedTx, Flow, GhostPair, NormTx, Source, Stage, TransactionType,
};

/// Result of running the transfer-pair detector over a batch.
pub struct TransferDetection {
    pub pairs: Vec<GhostPair>,
    /// Pre-built `EnrichedTx` records for every transaction that was part of
    /// a pair; Layer 1 must skip these ids entirely.
    pub enriched: Vec<EnrichedTx>,
    pub processed_ids: HashSet<String>,
}

/// Detects ghost pairs: same `amount_minor`, opposite direction, dates
/// within 2 days, in first-match iteration order.
///
/// Edge case (§4.2): three or more same-amount same-day opposite-direction
/// records pair greedily in iteration order; unmatched extras fall through
/// to Layer 1.
pub fn detect_transfer_pairs(batch: &[NormTx]) -> TransferDetection {
    let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
    for (idx, tx) in batch.iter().enumerate() {
        buckets.entry(tx.amount_minor).or_default().push(idx);
    }

    let mut processed = vec![false; batch.len()];
    let mut pairs = Vec::new();

    for (idx, tx) in batch.iter().enumerate() {
        if processed[idx] {
            continue;
        }
        let Some(candidates) = buckets.get(&tx.amount_minor) else {
            continue;
        };
        let Some(e_date) = tx.parsed_date() else {
            continue;
        };

        let mut matched = None;
        for &cand_idx in candidates {
            if cand_idx == idx || processed[cand_idx] {
                continue;
            }
            let candidate = &batch[cand_idx];
            if candidate.direction.is_outgoing() == tx.direction.is_outgoing() {
                continue;
            }
            let Some(c_date) = candidate.parsed_date() else {
                continue;
            };
            let diff = (e_date - c_date).num_days().abs();
            if diff <= 2 {
                matched = Some(cand_idx);
                break;
            }
        }

        if let Some(cand_idx) = matched {
            processed[idx] = true;
            processed[cand_idx] = true;
            let candidate = &batch[cand_idx];
            let diff = (tx.parsed_date().unwrap() - candidate.parsed_date().unwrap())
                .num_days()
                .abs();
            pairs.push(GhostPair {
                first_id: tx.id.clone(),
                second_id: candidate.id.clone(),
                amount_minor: tx.amount_minor,
                date_diff_days: diff,
            });
        }
    }

    let mut processed_ids = HashSet::new();
    let mut enriched = Vec::new();
    for pair in &pairs {
        processed_ids.insert(pair.first_id.clone());
        processed_ids.insert(pair.second_id.clone());
    }
    for tx in batch {
        if processed_ids.contains(&tx.id) {
            let peer = pairs
                .iter()
                .find_map(|p| p.peer_of(&tx.id))
                .expect("transfer id must belong to exactly one detected pair")
                .to_string();
            enriched.push(build_transfer_enriched(tx, &peer));
        }
    }

    TransferDetection {
        pairs,
        enriched,
        processed_ids,
    }
}

/// Builds the fixed `EnrichedTx` shape for a confirmed transfer leg, per
/// §4.2's literal field list.
fn build_transfer_enriched(tx: &NormTx, peer_id: &str) -> EnrichedTx {
    EnrichedTx {
        id: tx.id.clone(),
        original_description: tx.description.clone(),
        merchant_clean_name: None,
        merchant_logo: None,
        merchant_site: None,
        labels: vec!["transfer".to_string(), "internal".to_string()],
        is_recurring: false,
        recurrence_period: None,
        amount_minor: tx.amount_minor,
        direction: if tx.direction.is_outgoing() {
            Flow::Outgoing
        } else {
            Flow::Incoming
        },
        budget_category: BudgetCategory::Transfer,
        date: tx.date.clone(),
        ntropy_confidence: 1.0,
        agentic_confidence: None,
        stage: Stage::NtropyDone,
        source: Some(Source::MathBrain),
        reasoning_trace: vec!["[transfer_detector] matched as internal transfer".to_string()],
        context_data: Default::default(),
        exclude_from_analysis: true,
        transaction_type: TransactionType::Transfer,
        linked_transaction_id: Some(peer_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolve_core::DirectionHint;

    fn tx(id: &str, amount_minor: u64, direction: DirectionHint, date: &str) -> NormTx {
        NormTx {
            id: id.into(),
            description: format!("desc {id}"),
            amount_minor,
            currency: "GBP".into(),
            direction,
            provider_classification: Vec::new(),
            date: date.into(),
        }
    }

    #[test]
    fn ghost_pair_scenario_from_spec() {
        let batch = vec![
            tx("a", 5000, DirectionHint::Debit, "2024-01-10"),
            tx("b", 5000, DirectionHint::Credit, "2024-01-11"),
        ];
        let result = detect_transfer_pairs(&batch);
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.enriched.len(), 2);
        for e in &result.enriched {
            assert_eq!(e.budget_category, BudgetCategory::Transfer);
            assert!(e.exclude_from_analysis);
            assert_eq!(e.source, Some(Source::MathBrain));
            assert_eq!(e.ntropy_confidence, 1.0);
            assert_eq!(e.transaction_type, TransactionType::Transfer);
        }
        let a = result.enriched.iter().find(|e| e.id == "a").unwrap();
        assert_eq!(a.linked_transaction_id.as_deref(), Some("b"));
        let b = result.enriched.iter().find(|e| e.id == "b").unwrap();
        assert_eq!(b.linked_transaction_id.as_deref(), Some("a"));
    }

    #[test]
    fn date_diff_beyond_two_days_does_not_pair() {
        let batch = vec![
            tx("a", 5000, DirectionHint::Debit, "2024-01-10"),
            tx("b", 5000, DirectionHint::Credit, "2024-01-20"),
        ];
        let result = detect_transfer_pairs(&batch);
        assert!(result.pairs.is_empty());
        assert!(result.enriched.is_empty());
    }

    #[test]
    fn same_direction_does_not_pair() {
        let batch = vec![
            tx("a", 5000, DirectionHint::Debit, "2024-01-10"),
            tx("b", 5000, DirectionHint::Debit, "2024-01-11"),
        ];
        let result = detect_transfer_pairs(&batch);
        assert!(result.pairs.is_empty());
    }

    #[test]
    fn greedy_pairing_leaves_extras_unmatched() {
        let batch = vec![
            tx("a", 5000, DirectionHint::Debit, "2024-01-10"),
            tx("b", 5000, DirectionHint::Credit, "2024-01-10"),
            tx("c", 5000, DirectionHint::Credit, "2024-01-10"),
        ];
        let result = detect_transfer_pairs(&batch);
        assert_eq!(result.pairs.len(), 1);
        assert!(result.processed_ids.contains("a"));
        assert!(result.processed_ids.contains("b"));
        assert!(!result.processed_ids.contains("c"));
    }
}
