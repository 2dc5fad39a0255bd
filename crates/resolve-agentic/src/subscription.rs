//! C6: catalog-first, web-search-and-LLM-fallback subscription matching.

use std::sync::Arc;

use resolve_core::{SearchSnippet, SubscriptionCatalog, SubscriptionCatalogEntry, WebSearchProvider};
use serde::Deserialize;

/// Write-back happens only when the matcher itself (not the catalog seed
/// script) upserts a fresh LLM finding.
const UPSERT_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Tolerance used when the *cascade* looks itself up in the catalog: exact
/// equality, per §4.6 ("exact when coming from cascade").
const CASCADE_LOOKUP_TOLERANCE_MINOR: u64 = 0;

#[derive(Debug, Clone)]
pub struct SubscriptionMatchResult {
    pub is_subscription: bool,
    pub product_name: String,
    pub confidence: f64,
    pub recurrence: String,
    pub category: Option<String>,
    pub trace: Vec<String>,
}

impl SubscriptionMatchResult {
    fn skip(reason: &str, confidence: f64) -> Self {
        Self {
            is_subscription: false,
            product_name: String::new(),
            confidence,
            recurrence: "none".to_string(),
            category: None,
            trace: vec![reason.to_string()],
        }
    }
}

#[derive(Deserialize)]
struct SubscriptionLlmResponse {
    is_subscription: bool,
    product_name: String,
    confidence: f64,
    recurrence: String,
    category: String,
    #[serde(default)]
    reasoning: String,
}

pub struct SubscriptionMatcher {
    catalog: Arc<dyn SubscriptionCatalog>,
    search: Arc<dyn WebSearchProvider>,
    llm: Arc<dyn resolve_core::LlmProvider>,
}

impl SubscriptionMatcher {
    pub fn new(
        catalog: Arc<dyn SubscriptionCatalog>,
        search: Arc<dyn WebSearchProvider>,
        llm: Arc<dyn resolve_core::LlmProvider>,
    ) -> Self {
        Self {
            catalog,
            search,
            llm,
        }
    }

    /// Runs the full catalog → web search → LLM pipeline, per §4.6.
    pub async fn match_subscription(
        &self,
        merchant: &str,
        amount_minor: u64,
        currency: &str,
        description: Option<&str>,
    ) -> SubscriptionMatchResult {
        let mut trace = vec![format!(
            "starting subscription match for merchant='{merchant}', amount={amount_minor} {currency}"
        )];

        if let Some(hit) = self.check_catalog(merchant, amount_minor, currency, &mut trace).await {
            return hit;
        }

        let mut result = self
            .search_and_analyze(merchant, amount_minor, currency, description, &mut trace)
            .await;
        result.trace = trace;

        if result.is_subscription && result.confidence >= UPSERT_CONFIDENCE_THRESHOLD {
            self.upsert_to_catalog(merchant, amount_minor, currency, &result).await;
        }

        result
    }

    async fn check_catalog(
        &self,
        merchant: &str,
        amount_minor: u64,
        currency: &str,
        trace: &mut Vec<String>,
    ) -> Option<SubscriptionMatchResult> {
        trace.push(format!("checking catalog for merchant='{merchant}', amount={amount_minor}"));

        let entries = match self.catalog.lookup(merchant).await {
            Ok(entries) => entries,
            Err(err) => {
                trace.push(format!("catalog lookup error: {err}"));
                return None;
            }
        };

        if entries.is_empty() {
            trace.push("no entries found in catalog for this merchant".to_string());
            return None;
        }

        let mut candidates: Vec<&SubscriptionCatalogEntry> = entries
            .iter()
            .filter(|e| {
                e.currency.eq_ignore_ascii_case(currency)
                    && amount_diff(e.amount_minor, amount_minor) <= CASCADE_LOOKUP_TOLERANCE_MINOR
            })
            .collect();

        if candidates.is_empty() {
            trace.push("found entries for merchant, but no exact price match".to_string());
            return None;
        }

        candidates.sort_by(|a, b| {
            b.verified
                .cmp(&a.verified)
                .then(amount_diff(a.amount_minor, amount_minor).cmp(&amount_diff(b.amount_minor, amount_minor)))
        });

        let entry = candidates[0];
        trace.push(format!(
            "exact match found: {} at {} {currency}",
            entry.product_name, amount_minor
        ));

        Some(SubscriptionMatchResult {
            is_subscription: true,
            product_name: entry.product_name.clone(),
            confidence: entry.hit_confidence(),
            recurrence: entry.recurrence.clone(),
            category: Some(entry.category.clone()),
            trace: trace.clone(),
        })
    }

    async fn search_and_analyze(
        &self,
        merchant: &str,
        amount_minor: u64,
        currency: &str,
        description: Option<&str>,
        trace: &mut Vec<String>,
    ) -> SubscriptionMatchResult {
        let amount_display = amount_minor as f64 / 100.0;
        trace.push(format!("no catalog match, searching web for {merchant} pricing info"));

        let query = format!("{merchant} subscription price {currency} {amount_display:.2}");
        let snippets = match self.search.search(&query, 5).await {
            Ok(snippets) => snippets,
            Err(err) => {
                trace.push(format!("search error: {err}"));
                return SubscriptionMatchResult::skip("search unavailable", 0.0);
            }
        };

        trace.push("got search results, analysing with the LLM".to_string());
        self.analyze_with_llm(merchant, amount_minor, currency, description, &snippets, trace)
            .await
    }

    async fn analyze_with_llm(
        &self,
        merchant: &str,
        amount_minor: u64,
        currency: &str,
        description: Option<&str>,
        snippets: &[SearchSnippet],
        trace: &mut Vec<String>,
    ) -> SubscriptionMatchResult {
        let amount_display = amount_minor as f64 / 100.0;
        let search_summary: String = snippets
            .iter()
            .map(|s| format!("- {}: {}", s.title, s.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = SUBSCRIPTION_SYSTEM_PROMPT;
        let user_prompt = format!(
            "Transaction Details:\n- Merchant: {merchant}\n- Amount: {currency} {amount_display:.2}\n- Description: {}\n\nSearch Results:\n{search_summary}\n\nBased on these search results, determine if this transaction is a subscription payment and identify the specific product/tier.",
            description.unwrap_or("N/A"),
        );

        let response_text = match self.llm.complete(system_prompt, &user_prompt).await {
            Ok(text) => text,
            Err(err) => {
                trace.push(format!("LLM analysis error: {err}"));
                return SubscriptionMatchResult::skip("LLM unavailable", 0.3);
            }
        };

        match parse_llm_response(&response_text) {
            Some(parsed) => {
                trace.push(format!("LLM analysis: {}", parsed.reasoning));
                SubscriptionMatchResult {
                    is_subscription: parsed.is_subscription,
                    product_name: parsed.product_name,
                    confidence: parsed.confidence,
                    recurrence: parsed.recurrence,
                    category: Some(parsed.category),
                    trace: trace.clone(),
                }
            }
            None => {
                trace.push("failed to parse LLM response as JSON".to_string());
                SubscriptionMatchResult::skip("LLM response unparseable", 0.2)
            }
        }
    }

    async fn upsert_to_catalog(
        &self,
        merchant: &str,
        amount_minor: u64,
        currency: &str,
        result: &SubscriptionMatchResult,
    ) {
        if result.product_name.is_empty() {
            return;
        }
        let entry = SubscriptionCatalogEntry {
            merchant: merchant.to_string(),
            product_name: result.product_name.clone(),
            amount_minor,
            currency: currency.to_string(),
            recurrence: result.recurrence.clone(),
            category: result.category.clone().unwrap_or_else(|| "other".to_string()),
            verified: false,
            confidence: result.confidence,
        };
        let _ = self.catalog.upsert(entry).await;
    }
}

fn amount_diff(a: u64, b: u64) -> u64 {
    a.abs_diff(b)
}

fn parse_llm_response(text: &str) -> Option<SubscriptionLlmResponse> {
    let json_str = extract_json_block(text);
    serde_json::from_str(json_str).ok()
}

/// Strips a ```json fenced block if present, matching the original's
/// tolerance for Markdown-wrapped LLM output.
fn extract_json_block(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    text.trim()
}

const SUBSCRIPTION_SYSTEM_PROMPT: &str = r#"You are a subscription pricing analyst. Your job is to determine if a bank transaction matches a known subscription service.

Analyze the search results and determine:
1. Is this merchant likely a subscription service?
2. If so, what product/tier does this price point match?
3. How confident are you in this match? (0.0 to 1.0)

Respond in this exact JSON format:
{
    "is_subscription": true/false,
    "product_name": "Product name or tier",
    "confidence": 0.85,
    "recurrence": "Monthly/Weekly/Yearly/Quarterly",
    "category": "Entertainment/Utility/Health/Food/Transport/Finance/Other",
    "reasoning": "Brief explanation of your analysis"
}"#;
