//! C7: fuzzy merchant/amount/date scoring and greedy newest-first receipt
//! assignment.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use resolve_core::{EnrichedTx, ReceiptRecord};

const MERCHANT_WEIGHT: f64 = 0.40;
const AMOUNT_WEIGHT: f64 = 0.35;
const DATE_WEIGHT: f64 = 0.25;

const SUFFIXES_TO_STRIP: &[&str] = &[
    " ltd",
    " limited",
    " inc",
    " llc",
    " plc",
    ".com",
    ".co.uk",
    " uk",
    " gb",
    " online",
    " - receipt",
    " receipt",
    " order",
    " purchase",
];

const PREFIXES_TO_STRIP: &[&str] = &["www.", "receipt from ", "order from ", "payment to "];

/// A scored assignment of one receipt to one transaction.
#[derive(Debug, Clone)]
pub struct ReceiptMatch {
    pub receipt_id: String,
    pub confidence: f64,
    pub merchant_score: f64,
    pub amount_score: f64,
    pub date_score: f64,
    pub days_difference: i64,
}

/// Lowercases, trims, and strips common suffixes/prefixes so merchant
/// strings from wildly different sources compare fairly.
pub fn normalize_merchant_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    normalized = normalized.trim().to_string();

    for suffix in SUFFIXES_TO_STRIP {
        if let Some(stripped) = normalized.strip_suffix(suffix) {
            normalized = stripped.to_string();
        }
    }
    for prefix in PREFIXES_TO_STRIP {
        if let Some(stripped) = normalized.strip_prefix(prefix) {
            normalized = stripped.to_string();
        }
    }

    normalized.trim().to_string()
}

/// Ratcliff/Obershelp-style matching-blocks ratio, mirroring
/// `difflib.SequenceMatcher.ratio()`: `2 * matches / (len(a) + len(b))`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matches = matching_blocks_length(&a, &b);
    (2.0 * matches as f64) / (a.len() + b.len()) as f64
}

/// Total length of all matching blocks found by recursively taking the
/// longest common contiguous run and recursing on the remainders.
fn matching_blocks_length(a: &[char], b: &[char]) -> usize {
    let (len, a_start, b_start) = longest_match(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_blocks_length(&a[..a_start], &b[..b_start]);
    let right = matching_blocks_length(&a[a_start + len..], &b[b_start + len..]);
    len + left + right
}

fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best_len = 0;
    let mut best_a = 0;
    let mut best_b = 0;
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > best_len {
                best_len = k;
                best_a = i;
                best_b = j;
            }
        }
    }
    (best_len, best_a, best_b)
}

/// Merchant similarity against the receipt's cleaned name, sender domain,
/// sender local-part, and subject-line containment, per §4.7.
pub fn merchant_similarity(
    transaction_merchant: &str,
    receipt: &ReceiptRecord,
) -> (f64, &'static str) {
    if transaction_merchant.trim().is_empty() {
        return (0.0, "no_transaction_merchant");
    }

    let tx_normalized = normalize_merchant_name(transaction_merchant);
    let mut best_score = 0.0;
    let mut best_source = "no_match";

    if let Some(receipt_merchant) = &receipt.extracted_merchant {
        let receipt_normalized = normalize_merchant_name(receipt_merchant);
        let score = similarity_ratio(&tx_normalized, &receipt_normalized);
        if score > best_score {
            best_score = score;
            best_source = "merchant_name";
        }
    }

    if let Some((local, domain_full)) = receipt.sender_address.split_once('@') {
        let domain = domain_full.split('.').next().unwrap_or(domain_full);
        let domain_normalized = normalize_merchant_name(domain);
        let score = similarity_ratio(&tx_normalized, &domain_normalized);
        if score > best_score {
            best_score = score;
            best_source = "sender_email";
        }

        let sender_name = local
            .to_lowercase()
            .replace("noreply", "")
            .replace("no-reply", "")
            .replace("receipts", "")
            .replace("orders", "");
        let sender_name = normalize_merchant_name(&sender_name);
        if !sender_name.is_empty() {
            let score = similarity_ratio(&tx_normalized, &sender_name);
            if score > best_score {
                best_score = score;
                best_source = "sender_name";
            }
        }
    }

    let subject_normalized = normalize_merchant_name(&receipt.subject);
    if !tx_normalized.is_empty() && subject_normalized.contains(&tx_normalized) {
        let score = 0.9;
        if score > best_score {
            best_score = score;
            best_source = "subject_contains";
        }
    }

    (best_score, best_source)
}

/// Amount similarity per §4.7's banded tolerances.
pub fn amount_similarity(transaction_amount_minor: u64, receipt_amount_minor: Option<u64>) -> (f64, &'static str) {
    let Some(receipt_amount) = receipt_amount_minor else {
        return (0.5, "receipt_amount_unknown");
    };

    if transaction_amount_minor == receipt_amount {
        return (1.0, "exact_match");
    }
    if transaction_amount_minor == 0 {
        return (0.0, "zero_transaction");
    }

    let diff = (transaction_amount_minor as i64 - receipt_amount as i64).unsigned_abs() as f64;
    let diff_percent = diff / transaction_amount_minor as f64;

    if diff_percent <= 0.01 {
        (0.95, "within_1_percent")
    } else if diff_percent <= 0.02 {
        (0.85, "within_2_percent")
    } else if diff_percent <= 0.05 {
        (0.70, "within_5_percent")
    } else if diff_percent <= 0.10 {
        (0.50, "within_10_percent")
    } else {
        (0.0, "amount_mismatch")
    }
}

/// Date-proximity similarity per §4.7. `days_diff = receipt_date -
/// transaction_date`.
pub fn date_similarity(transaction_date: &str, receipt_received_at: chrono::DateTime<chrono::Utc>) -> (f64, i64) {
    let Ok(transaction_date) = NaiveDate::parse_from_str(transaction_date, "%Y-%m-%d") else {
        return (0.5, 0);
    };
    let days_diff = (receipt_received_at.date_naive() - transaction_date).num_days();

    let score = match days_diff {
        0 => 1.0,
        1 => 0.95,
        2..=3 => 0.85,
        4..=7 => 0.70,
        -1 => 0.80,
        d if d > 7 => 0.30,
        _ => 0.20,
    };
    (score, days_diff)
}

/// Scores a single transaction/receipt pair. `transaction_merchant` is the
/// cleaned merchant name if present, else the original description.
pub fn score_receipt(
    transaction_merchant: &str,
    transaction_amount_minor: u64,
    transaction_date: &str,
    receipt: &ReceiptRecord,
) -> ReceiptMatch {
    let (merchant_score, _) = merchant_similarity(transaction_merchant, receipt);
    let (amount_score, _) = amount_similarity(transaction_amount_minor, receipt.extracted_amount_minor);
    let (date_score, days_difference) = date_similarity(transaction_date, receipt.received_at);

    let confidence =
        merchant_score * MERCHANT_WEIGHT + amount_score * AMOUNT_WEIGHT + date_score * DATE_WEIGHT;

    ReceiptMatch {
        receipt_id: receipt.id.clone(),
        confidence,
        merchant_score,
        amount_score,
        date_score,
        days_difference,
    }
}

/// Best receipt for a single transaction among `candidates`, if any clears
/// `min_confidence`.
pub fn best_receipt_for_transaction(
    transaction_merchant: &str,
    transaction_amount_minor: u64,
    transaction_date: &str,
    candidates: &[ReceiptRecord],
    min_confidence: f64,
) -> Option<ReceiptMatch> {
    candidates
        .iter()
        .map(|r| score_receipt(transaction_merchant, transaction_amount_minor, transaction_date, r))
        .filter(|m| m.confidence >= min_confidence)
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
}

/// Greedy newest-first assignment across a whole batch: each receipt is
/// consumed by at most one transaction. Run once per batch, ahead of the
/// per-transaction sub-workflow, so concurrent workflows never race on a
/// shared "already matched" set (§4.5's "parallelism is at the transaction
/// level").
pub fn assign_receipts(
    transactions: &[EnrichedTx],
    receipts: &[ReceiptRecord],
    min_confidence: f64,
) -> HashMap<String, ReceiptMatch> {
    let mut ordered: Vec<&EnrichedTx> = transactions.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date));

    let mut matched_receipts: HashSet<String> = HashSet::new();
    let mut assignments = HashMap::new();

    for tx in ordered {
        let available: Vec<ReceiptRecord> = receipts
            .iter()
            .filter(|r| !matched_receipts.contains(&r.id))
            .cloned()
            .collect();
        if available.is_empty() {
            continue;
        }

        let merchant = tx
            .merchant_clean_name
            .clone()
            .unwrap_or_else(|| tx.original_description.clone());

        if let Some(best) = best_receipt_for_transaction(
            &merchant,
            tx.amount_minor,
            &tx.date,
            &available,
            min_confidence,
        ) {
            matched_receipts.insert(best.receipt_id.clone());
            assignments.insert(tx.id.clone(), best);
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use resolve_core::{BudgetCategory, Flow, Source, Stage, TransactionType};

    fn receipt(id: &str, merchant: Option<&str>, amount_minor: Option<u64>, date: &str, sender: &str, subject: &str) -> ReceiptRecord {
        ReceiptRecord {
            id: id.into(),
            sender_address: sender.into(),
            subject: subject.into(),
            received_at: chrono::Utc.with_ymd_and_hms(
                date[0..4].parse().unwrap(),
                date[5..7].parse().unwrap(),
                date[8..10].parse().unwrap(),
                0,
                0,
                0,
            ).unwrap(),
            extracted_merchant: merchant.map(String::from),
            extracted_amount_minor: amount_minor,
            currency: "GBP".into(),
        }
    }

    fn enriched(id: &str, merchant: Option<&str>, amount_minor: u64, date: &str) -> EnrichedTx {
        EnrichedTx {
            id: id.into(),
            original_description: merchant.unwrap_or("UNKNOWN").to_string(),
            merchant_clean_name: merchant.map(String::from),
            merchant_logo: None,
            merchant_site: None,
            labels: vec![],
            is_recurring: false,
            recurrence_period: None,
            amount_minor,
            direction: Flow::Outgoing,
            budget_category: BudgetCategory::Discretionary,
            date: date.into(),
            ntropy_confidence: 0.5,
            agentic_confidence: None,
            stage: Stage::NtropyDone,
            source: Some(Source::Ntropy),
            reasoning_trace: vec![],
            context_data: Default::default(),
            exclude_from_analysis: false,
            transaction_type: TransactionType::Regular,
            linked_transaction_id: None,
        }
    }

    #[test]
    fn normalize_strips_known_suffixes_and_prefixes() {
        assert_eq!(normalize_merchant_name("Netflix.com"), "netflix");
        assert_eq!(normalize_merchant_name("www.Gymbox Ltd"), "gymbox");
    }

    #[test]
    fn exact_amount_scores_one() {
        let (score, kind) = amount_similarity(1000, Some(1000));
        assert_eq!(score, 1.0);
        assert_eq!(kind, "exact_match");
    }

    #[test]
    fn amount_within_five_percent() {
        let (score, _) = amount_similarity(1000, Some(1040));
        assert_eq!(score, 0.70);
    }

    #[test]
    fn date_same_day_scores_one() {
        let received = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let (score, diff) = date_similarity("2024-03-01", received);
        assert_eq!(score, 1.0);
        assert_eq!(diff, 0);
    }

    #[test]
    fn best_receipt_picks_highest_confidence_above_threshold() {
        let receipts = vec![
            receipt("r1", Some("Netflix"), Some(1099), "2024-03-01", "noreply@netflix.com", "Your Netflix receipt"),
            receipt("r2", Some("Spotify"), Some(999), "2024-03-01", "noreply@spotify.com", "Spotify invoice"),
        ];
        let best = best_receipt_for_transaction("Netflix", 1099, "2024-03-01", &receipts, 0.6).unwrap();
        assert_eq!(best.receipt_id, "r1");
    }

    #[test]
    fn assign_receipts_never_double_assigns_newest_first() {
        let receipts = vec![
            receipt("r1", Some("Netflix"), Some(1099), "2024-03-05", "noreply@netflix.com", "Netflix receipt"),
        ];
        let transactions = vec![
            enriched("t_old", Some("Netflix"), 1099, "2024-03-01"),
            enriched("t_new", Some("Netflix"), 1099, "2024-03-05"),
        ];
        let assignments = assign_receipts(&transactions, &receipts, 0.6);
        assert_eq!(assignments.len(), 1);
        assert!(assignments.contains_key("t_new"));
        assert!(!assignments.contains_key("t_old"));
    }
}
