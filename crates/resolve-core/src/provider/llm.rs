//! LLM collaborator used by the subscription matcher (C6) and the Sherlock
//! fallback node (C5).

use async_trait::async_trait;

use crate::error::ResolveResult;

/// Outcome of asking the LLM to fill in a structured shape, per Design Notes
/// §9: "LLM outputs are dynamically typed JSON; model them as a tagged
/// variant... never raise out of a node."
#[derive(Debug, Clone)]
pub enum LlmOutcome<T> {
    /// The LLM responded and its JSON parsed into `T`.
    Ok(T),
    /// The LLM responded but the JSON did not match the expected shape.
    ParseError(String),
    /// The LLM call itself failed or timed out.
    LlmError(String),
}

impl<T> LlmOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            LlmOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, LlmOutcome::Ok(_))
    }
}

/// A single structured LLM call: a prompt in, raw text out. Callers are
/// responsible for building the prompt and parsing the response into their
/// own `LlmOutcome<T>` — the trait itself never assumes a particular JSON
/// schema, since the subscription matcher and the Sherlock node expect
/// different shapes.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> ResolveResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_ok_unwraps_only_the_ok_variant() {
        let ok: LlmOutcome<i32> = LlmOutcome::Ok(42);
        assert_eq!(ok.ok(), Some(42));

        let parse_err: LlmOutcome<i32> = LlmOutcome::ParseError("bad json".into());
        assert_eq!(parse_err.ok(), None);

        let llm_err: LlmOutcome<i32> = LlmOutcome::LlmError("timeout".into());
        assert!(!llm_err.is_ok());
    }
}
