//! JSON invariant report, the only report format this crate needs once
//! HTML/chart generation had no counterpart in SPEC_FULL.md (see DESIGN.md).

use serde::{Deserialize, Serialize};

use crate::error::EvalResult;
use crate::invariants::InvariantViolation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantReport {
    pub batch_size: usize,
    pub violation_count: usize,
    pub violations: Vec<InvariantViolation>,
    pub passes: bool,
}

impl InvariantReport {
    pub fn new(batch_size: usize, violations: Vec<InvariantViolation>) -> Self {
        Self {
            batch_size,
            violation_count: violations.len(),
            passes: violations.is_empty(),
            violations,
        }
    }

    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
