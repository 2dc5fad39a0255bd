//! C5: the agentic sub-workflow. A single typed state threaded through
//! fixed nodes — `subscription_match -> email_receipt -> event_correlation
//! -> merge -> sherlock -> terminal` — instead of a dynamic per-node state
//! map. Parallelism is at the transaction level: many [`WorkflowState`]s run
//! concurrently, never the nodes of one.

use std::sync::Arc;

use resolve_core::{EnrichedTx, LlmProvider, Source};
use serde::Deserialize;
use serde_json::json;

use crate::receipts::ReceiptMatch;
use crate::subscription::SubscriptionMatcher;

const EMAIL_RECEIPT_CONFIDENCE: f64 = 0.92;

#[derive(Deserialize)]
struct SherlockLlmResponse {
    category: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Inputs the sub-workflow needs beyond the Layer-1 `EnrichedTx` itself.
pub struct WorkflowInputs<'a> {
    pub currency: &'a str,
    pub mail_grant: Option<&'a str>,
    /// The receipt this transaction was assigned during the batch-wide
    /// greedy pass (see [`crate::receipts::assign_receipts`]), if any.
    pub receipt_match: Option<&'a ReceiptMatch>,
}

pub struct AgenticWorkflow {
    subscription_matcher: Arc<SubscriptionMatcher>,
    llm: Arc<dyn LlmProvider>,
    tau: f64,
}

impl AgenticWorkflow {
    pub fn new(subscription_matcher: Arc<SubscriptionMatcher>, llm: Arc<dyn LlmProvider>, tau: f64) -> Self {
        Self {
            subscription_matcher,
            llm,
            tau,
        }
    }

    /// Runs every node over one transaction and returns the refined
    /// `EnrichedTx` with `agentic_confidence`, `source`, and `stage` settled.
    pub async fn run(&self, mut state: EnrichedTx, inputs: WorkflowInputs<'_>) -> EnrichedTx {
        let mut confidences: Vec<f64> = Vec::new();

        if let Some(sub_confidence) = self.subscription_match(&mut state, &inputs).await {
            confidences.push(sub_confidence);
        }

        if let Some(email_confidence) = self.email_receipt(&mut state, &inputs) {
            confidences.push(email_confidence);
        }

        self.event_correlation(&mut state);

        self.merge(&mut state, &confidences);

        self.sherlock(&mut state).await;

        state.stage = resolve_core::Stage::AgenticDone;
        state
    }

    async fn subscription_match(&self, state: &mut EnrichedTx, inputs: &WorkflowInputs<'_>) -> Option<f64> {
        let merchant = state
            .merchant_clean_name
            .clone()
            .unwrap_or_else(|| state.original_description.clone());

        if merchant.trim().is_empty() || state.amount_minor == 0 {
            state.push_trace("subscription_match", "skipping - no merchant or invalid amount");
            return None;
        }

        let result = self
            .subscription_matcher
            .match_subscription(
                &merchant,
                state.amount_minor,
                inputs.currency,
                Some(state.original_description.as_str()),
            )
            .await;

        for line in &result.trace {
            state.push_trace("subscription_match", line);
        }
        state.push_trace(
            "subscription_match",
            format!(
                "complete - is_subscription={}, confidence={:.2}",
                result.is_subscription, result.confidence
            ),
        );

        state.context_data.insert(
            "subscription".to_string(),
            json!({
                "is_subscription": result.is_subscription,
                "product_name": result.product_name,
                "category": result.category,
                "recurrence": result.recurrence,
                "confidence": result.confidence,
            }),
        );

        if result.is_subscription {
            if result.recurrence != "none" {
                state.is_recurring = true;
                state.recurrence_period = Some(result.recurrence.clone());
            }
            Some(result.confidence)
        } else {
            None
        }
    }

    fn email_receipt(&self, state: &mut EnrichedTx, inputs: &WorkflowInputs<'_>) -> Option<f64> {
        if inputs.mail_grant.is_none() {
            state.push_trace("email_receipt", "skipping - no mail grant available");
            return None;
        }

        match inputs.receipt_match {
            Some(matched) => {
                state.push_trace(
                    "email_receipt",
                    format!("found matching receipt (score {:.2})", matched.confidence),
                );
                state.context_data.insert(
                    "email_receipt".to_string(),
                    json!({
                        "found": true,
                        "receipt_id": matched.receipt_id,
                        "match_confidence": matched.confidence,
                    }),
                );
                Some(EMAIL_RECEIPT_CONFIDENCE)
            }
            None => {
                state.push_trace("email_receipt", "no matching email receipt found");
                None
            }
        }
    }

    /// Event correlation is a placeholder in the original pipeline (no
    /// public events API was retrieved with it) — it only records a skip.
    fn event_correlation(&self, state: &mut EnrichedTx) {
        state.push_trace("event_correlation", "skipping - no event data source configured");
    }

    fn merge(&self, state: &mut EnrichedTx, confidences: &[f64]) {
        let merged = confidences.iter().cloned().fold(0.0_f64, f64::max);
        state.agentic_confidence = Some(merged);
        if merged >= self.tau {
            state.source = Some(Source::ContextHunter);
        }
        state.push_trace("merge", format!("combined confidence = {merged:.2}"));
    }

    /// Runs only if the merged confidence is still below tau.
    async fn sherlock(&self, state: &mut EnrichedTx) {
        let current = state.agentic_confidence.unwrap_or(0.0);
        if current >= self.tau {
            return;
        }

        let system_prompt = SHERLOCK_SYSTEM_PROMPT;
        let user_prompt = format!(
            "Description: {}\nPayee: {}\nAmount (minor units): {}",
            state.original_description,
            state.merchant_clean_name.as_deref().unwrap_or("unknown"),
            state.amount_minor,
        );

        let response_text = match self.llm.complete(system_prompt, &user_prompt).await {
            Ok(text) => text,
            Err(err) => {
                state.push_trace("sherlock", format!("LLM unavailable: {err}"));
                return;
            }
        };

        match serde_json::from_str::<SherlockLlmResponse>(&response_text) {
            Ok(parsed) if parsed.confidence > current => {
                state.push_trace(
                    "sherlock",
                    format!("LLM raised confidence to {:.2}: {}", parsed.confidence, parsed.reasoning),
                );
                state.agentic_confidence = Some(parsed.confidence);
                state.source = Some(Source::Sherlock);
                state.labels.push(parsed.category);
            }
            Ok(_) => {
                state.push_trace("sherlock", "LLM response did not improve on current confidence");
            }
            Err(_) => {
                state.push_trace("sherlock", "LLM response was not valid JSON");
            }
        }
    }
}

const SHERLOCK_SYSTEM_PROMPT: &str = r#"You are a transaction categorisation analyst. Given a description, payee, and amount, determine the most likely budget category.

Respond in this exact JSON format:
{
    "category": "category name",
    "confidence": 0.75,
    "reasoning": "brief explanation"
}"#;
