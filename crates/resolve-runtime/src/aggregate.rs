//! C10: rolls enriched records into monthly averages over a trailing,
//! complete-months-only analysis window, per §4.10.

use std::collections::BTreeSet;

use resolve_core::{BudgetCategory, EnrichedTx};

/// Default window size in complete months.
pub const DEFAULT_ANALYSIS_MONTHS: u32 = 3;

/// Per-category totals and derived monthly averages for the window.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BudgetAnalysis {
    pub income_total_minor: u64,
    pub debt_total_minor: u64,
    pub fixed_total_minor: u64,
    pub discretionary_total_minor: u64,
    pub income_monthly_avg_minor: u64,
    pub debt_monthly_avg_minor: u64,
    pub fixed_monthly_avg_minor: u64,
    pub discretionary_monthly_avg_minor: u64,
    /// `max(0, income - fixed - debt)`, averaged the same way.
    pub safe_to_spend_minor: u64,
    /// Number of distinct complete months actually present in the window.
    pub completed_months_in_window: usize,
}

/// Aggregates `transactions` over the trailing `window_months` complete
/// months, excluding `current_month` (e.g. `"2024-03"`) entirely.
///
/// Transactions outside the window, in the current partial month, or tagged
/// `exclude_from_analysis` (transfers) are skipped.
pub fn aggregate_budget(
    transactions: &[EnrichedTx],
    current_month: &str,
    window_months: u32,
) -> BudgetAnalysis {
    let window_months = window_months.max(1);
    let mut months_seen: BTreeSet<String> = BTreeSet::new();
    let mut income = 0u64;
    let mut debt = 0u64;
    let mut fixed = 0u64;
    let mut discretionary = 0u64;

    let cutoff = trailing_month_floor(current_month, window_months);

    for tx in transactions {
        if tx.exclude_from_analysis {
            continue;
        }
        let Some(month) = month_of(&tx.date) else {
            continue;
        };
        if month.as_str() >= current_month {
            continue;
        }
        if let Some(cutoff) = &cutoff {
            if month.as_str() < cutoff.as_str() {
                continue;
            }
        }

        months_seen.insert(month);
        match tx.budget_category {
            BudgetCategory::Income => income += tx.amount_minor,
            BudgetCategory::Debt => debt += tx.amount_minor,
            BudgetCategory::Fixed => fixed += tx.amount_minor,
            BudgetCategory::Discretionary => discretionary += tx.amount_minor,
            BudgetCategory::Transfer => {}
        }
    }

    let completed_months_in_window = months_seen.len();
    let divisor = (window_months as usize).min(completed_months_in_window).max(1) as u64;

    let income_avg = income / divisor;
    let debt_avg = debt / divisor;
    let fixed_avg = fixed / divisor;
    let discretionary_avg = discretionary / divisor;
    let safe_to_spend = income.saturating_sub(fixed).saturating_sub(debt);

    BudgetAnalysis {
        income_total_minor: income,
        debt_total_minor: debt,
        fixed_total_minor: fixed,
        discretionary_total_minor: discretionary,
        income_monthly_avg_minor: income_avg,
        debt_monthly_avg_minor: debt_avg,
        fixed_monthly_avg_minor: fixed_avg,
        discretionary_monthly_avg_minor: discretionary_avg,
        safe_to_spend_minor: safe_to_spend / divisor,
        completed_months_in_window,
    }
}

fn month_of(date: &str) -> Option<String> {
    date.get(0..7).map(str::to_string)
}

/// The earliest month (`YYYY-MM`) still inside an `window_months`-wide
/// trailing window ending just before `current_month`.
fn trailing_month_floor(current_month: &str, window_months: u32) -> Option<String> {
    let (year, month) = current_month.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;

    let total_months = year * 12 + (month as i32 - 1) - window_months as i32;
    let floor_year = total_months.div_euclid(12);
    let floor_month = total_months.rem_euclid(12) + 1;
    Some(format!("{floor_year:04}-{floor_month:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolve_core::{Flow, Stage, TransactionType};

    fn tx(date: &str, category: BudgetCategory, amount_minor: u64) -> EnrichedTx {
        EnrichedTx {
            id: format!("t-{date}-{amount_minor}"),
            original_description: "x".into(),
            merchant_clean_name: None,
            merchant_logo: None,
            merchant_site: None,
            labels: vec![],
            is_recurring: false,
            recurrence_period: None,
            amount_minor,
            direction: if category == BudgetCategory::Income {
                Flow::Incoming
            } else {
                Flow::Outgoing
            },
            budget_category: category,
            date: date.to_string(),
            ntropy_confidence: 1.0,
            agentic_confidence: None,
            stage: Stage::Complete,
            source: None,
            reasoning_trace: vec![],
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

    #[test]
    fn excludes_current_partial_month() {
        let txs = vec![
            tx("2024-03-01", BudgetCategory::Income, 200_00),
            tx("2024-04-01", BudgetCategory::Income, 999_00),
        ];
        let analysis = aggregate_budget(&txs, "2024-04", 3);
        assert_eq!(analysis.income_total_minor, 200_00);
    }

    #[test]
    fn averages_divide_by_months_actually_present_capped_at_window() {
        let txs = vec![
            tx("2024-01-01", BudgetCategory::Income, 300_00),
            tx("2024-02-01", BudgetCategory::Income, 300_00),
            tx("2024-03-01", BudgetCategory::Income, 300_00),
        ];
        let analysis = aggregate_budget(&txs, "2024-04", 3);
        assert_eq!(analysis.completed_months_in_window, 3);
        assert_eq!(analysis.income_monthly_avg_minor, 300_00);
    }

    #[test]
    fn single_month_of_data_still_divides_by_one_not_by_window() {
        let txs = vec![tx("2024-03-01", BudgetCategory::Income, 300_00)];
        let analysis = aggregate_budget(&txs, "2024-04", 3);
        assert_eq!(analysis.completed_months_in_window, 1);
        assert_eq!(analysis.income_monthly_avg_minor, 300_00);
    }

    #[test]
    fn transfers_are_skipped_entirely() {
        let txs = vec![tx("2024-03-01", BudgetCategory::Transfer, 500_00)];
        let analysis = aggregate_budget(&txs, "2024-04", 3);
        assert_eq!(analysis.income_total_minor + analysis.debt_total_minor + analysis.fixed_total_minor + analysis.discretionary_total_minor, 0);
        assert_eq!(analysis.completed_months_in_window, 0);
    }

    #[test]
    fn safe_to_spend_floors_at_zero() {
        let txs = vec![
            tx("2024-03-01", BudgetCategory::Income, 100_00),
            tx("2024-03-02", BudgetCategory::Fixed, 80_00),
            tx("2024-03-03", BudgetCategory::Debt, 50_00),
        ];
        let analysis = aggregate_budget(&txs, "2024-04", 3);
        assert_eq!(analysis.safe_to_spend_minor, 0);
    }

    #[test]
    fn trailing_floor_wraps_year_boundary() {
        assert_eq!(trailing_month_floor("2024-02", 3).unwrap(), "2023-11");
        assert_eq!(trailing_month_floor("2024-01", 1).unwrap(), "2023-12");
    }
}
