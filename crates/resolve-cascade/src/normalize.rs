//! C1: converts raw aggregator records into the canonical intermediate form.

use resolve_core::{NormTx, RawTx, ResolveError, ResolveResult};
use sha2::{Digest, Sha256};

/// Normalises a single raw record.
///
/// Fails with [`ResolveError::Input`] only when the amount itself could not
/// be extracted (non-finite) — id and description both have deterministic
/// fallbacks per §4.1.
pub fn normalize(raw: &RawTx) -> ResolveResult<NormTx> {
    if !raw.amount.is_finite() {
        return Err(ResolveError::input(
            "amount could not be extracted from raw transaction",
        ));
    }

    let amount_minor = (raw.amount.abs() * 100.0).round() as u64;
    let description = raw.description.clone().unwrap_or_default();
    let date = extract_date(&raw.timestamp);

    let id = match &raw.id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => stable_hash_id(&description, raw.amount, &raw.timestamp),
    };

    Ok(NormTx {
        id,
        description,
        amount_minor,
        currency: raw.currency.clone(),
        direction: raw.direction,
        provider_classification: raw.provider_classification.clone(),
        date,
    })
}

/// Normalises a batch, returning one `Result` per input record in order.
pub fn normalize_batch(raws: &[RawTx]) -> Vec<ResolveResult<NormTx>> {
    raws.iter().map(normalize).collect()
}

/// Takes the first 10 characters of the timestamp, splitting on `T` first so
/// both `2024-01-10` and `2024-01-10T09:00:00Z` yield `2024-01-10`.
fn extract_date(timestamp: &str) -> String {
    let date_part = timestamp.split('T').next().unwrap_or(timestamp);
    date_part.chars().take(10).collect()
}

/// Derives a stable id from the record's other fields when the aggregator
/// didn't supply one, so re-ingesting the same feed twice produces the same
/// id (required for the idempotency property in §8).
fn stable_hash_id(description: &str, amount: f64, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    hasher.update(amount.to_bits().to_le_bytes());
    hasher.update(timestamp.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
