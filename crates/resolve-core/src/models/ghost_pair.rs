//! Internal-transfer pairing produced by Layer 0 (C2).

use serde::{Deserialize, Serialize};

/// An unordered pair of `NormTx` ids that net to zero across accounts within
/// a short time window: an internal transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostPair {
    pub first_id: String,
    pub second_id: String,
    pub amount_minor: u64,
    /// Absolute difference in days between the two transactions' dates.
    pub date_diff_days: i64,
}

impl GhostPair {
    /// Returns the id of the other member of the pair, or `None` if `id`
    /// does not belong to this pair.
    pub fn peer_of(&self, id: &str) -> Option<&str> {
        if self.first_id == id {
            Some(&self.second_id)
        } else if self.second_id == id {
            Some(&self.first_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_of_resolves_either_direction() {
        let pair = GhostPair {
            first_id: "a".into(),
            second_id: "b".into(),
            amount_minor: 5000,
            date_diff_days: 1,
        };
        assert_eq!(pair.peer_of("a"), Some("b"));
        assert_eq!(pair.peer_of("b"), Some("a"));
        assert_eq!(pair.peer_of("c"), None);
    }
}
