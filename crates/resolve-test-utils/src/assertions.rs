//! Custom assertion macros for the cascade's universal invariants (§8).

/// Assert that `amount_minor`, `date`, and `ntropy_confidence` all satisfy
/// the cascade's basic shape invariants for a single `EnrichedTx`.
#[macro_export]
macro_rules! assert_enriched_tx_well_formed {
    ($tx:expr) => {{
        let tx = &$tx;
        assert_eq!(tx.date.len(), 10, "date must be YYYY-MM-DD: {}", tx.date);
        assert!(
            (0.0..=1.0).contains(&tx.ntropy_confidence),
            "ntropy_confidence out of [0,1]: {}",
            tx.ntropy_confidence
        );
        if let Some(agentic) = tx.agentic_confidence {
            assert!(
                (0.0..=1.0).contains(&agentic),
                "agentic_confidence out of [0,1]: {agentic}"
            );
        }
    }};
}

/// Assert that the cascade short-circuit rule held: a confident Layer-1
/// record never went through the agentic sub-workflow.
#[macro_export]
macro_rules! assert_short_circuited_at_layer1 {
    ($tx:expr, $tau:expr) => {{
        let tx = &$tx;
        if tx.ntropy_confidence >= $tau {
            assert_eq!(
                tx.source,
                Some(resolve_core::Source::Ntropy),
                "high-confidence record did not short-circuit: {:?}",
                tx.id
            );
            assert!(
                tx.agentic_confidence.is_none() || tx.agentic_confidence == Some(tx.ntropy_confidence),
                "high-confidence record still carries a distinct agentic_confidence: {:?}",
                tx.id
            );
        }
    }};
}

/// Assert that two `EnrichedTx` ids are a correctly cross-linked ghost pair.
#[macro_export]
macro_rules! assert_ghost_pair_linked {
    ($a:expr, $b:expr) => {{
        let a = &$a;
        let b = &$b;
        assert_eq!(a.amount_minor, b.amount_minor, "ghost pair amounts differ");
        assert_ne!(a.direction, b.direction, "ghost pair directions must be opposite");
        assert_eq!(a.linked_transaction_id.as_deref(), Some(b.id.as_str()));
        assert_eq!(b.linked_transaction_id.as_deref(), Some(a.id.as_str()));
        assert!(a.exclude_from_analysis && b.exclude_from_analysis);
    }};
}

/// Assert the budget-aggregation invariant: `income - fixed - debt >=
/// safe_to_spend >= 0`.
#[macro_export]
macro_rules! assert_safe_to_spend_consistent {
    ($analysis:expr) => {{
        let analysis = &$analysis;
        let headroom = analysis
            .income_total_minor
            .saturating_sub(analysis.fixed_total_minor)
            .saturating_sub(analysis.debt_total_minor);
        assert!(
            analysis.safe_to_spend_minor <= headroom || analysis.safe_to_spend_minor == 0,
            "safe_to_spend exceeds income - fixed - debt"
        );
    }};
}
