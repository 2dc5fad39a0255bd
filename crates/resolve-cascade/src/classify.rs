//! C4: the ordered-keyword budget classifier shared by Layer 1 and the
//! agentic sub-workflow's terminal node.
//!
//! Transfers are tagged directly by [`crate::transfer_pairs`] and never reach
//! this function — it only sees regular and refund transactions (§4.4).

use resolve_core::{BudgetCategory, Flow};

/// Tokens that indicate a debt-servicing payment (loans, credit cards).
const DEBT_TOKENS: &[&str] = &[
    "loan",
    "credit card",
    "creditcard",
    "mortgage",
    "hire purchase",
    "klarna",
    "clearpay",
    "afterpay",
    "overdraft",
];

/// Tokens that indicate a fixed recurring household cost.
const FIXED_COST_TOKENS: &[&str] = &[
    "rent",
    "council tax",
    "utilities",
    "electric",
    "gas board",
    "water board",
    "insurance",
    "broadband",
    "mobile phone",
    "phone bill",
    "tv licence",
    "tv license",
];

/// Classifies a transaction into a budget category using the ordered rules
/// from §4.4:
///
/// 1. Incoming funds are Income.
/// 2. A label or description token from [`DEBT_TOKENS`] is Debt.
/// 3. A label or description token from [`FIXED_COST_TOKENS`], or a
///    recurring outgoing transaction, is Fixed.
/// 4. Everything else outgoing is Discretionary.
pub fn classify(labels: &[String], description: &str, is_recurring: bool, direction: Flow) -> BudgetCategory {
    if direction == Flow::Incoming {
        return BudgetCategory::Income;
    }

    let description_lower = description.to_lowercase();
    let labels_lower: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();

    if contains_any(&labels_lower, &description_lower, DEBT_TOKENS) {
        return BudgetCategory::Debt;
    }

    if contains_any(&labels_lower, &description_lower, FIXED_COST_TOKENS) || is_recurring {
        return BudgetCategory::Fixed;
    }

    BudgetCategory::Discretionary
}

fn contains_any(labels_lower: &[String], description_lower: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| {
        description_lower.contains(token) || labels_lower.iter().any(|l| l.contains(token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_is_always_income() {
        let result = classify(&["loan".to_string()], "LOAN REPAYMENT IN", false, Flow::Incoming);
        assert_eq!(result, BudgetCategory::Income);
    }

    #[test]
    fn debt_token_in_description() {
        let result = classify(&[], "MONTHLY MORTGAGE PAYMENT", false, Flow::Outgoing);
        assert_eq!(result, BudgetCategory::Debt);
    }

    #[test]
    fn debt_token_in_label_wins_over_fixed() {
        let result = classify(
            &["credit card".to_string()],
            "PAYMENT REF 1234",
            true,
            Flow::Outgoing,
        );
        assert_eq!(result, BudgetCategory::Debt);
    }

    #[test]
    fn fixed_cost_token_in_description() {
        let result = classify(&[], "COUNCIL TAX DIRECT DEBIT", false, Flow::Outgoing);
        assert_eq!(result, BudgetCategory::Fixed);
    }

    #[test]
    fn recurring_without_fixed_token_is_still_fixed() {
        let result = classify(&["entertainment".to_string()], "NETFLIX.COM", true, Flow::Outgoing);
        assert_eq!(result, BudgetCategory::Fixed);
    }

    #[test]
    fn non_recurring_non_debt_non_fixed_is_discretionary() {
        let result = classify(&["retail".to_string()], "CORNER SHOP", false, Flow::Outgoing);
        assert_eq!(result, BudgetCategory::Discretionary);
    }
}
