//! `EnrichmentConfig`: the single configuration record loaded at startup.
//!
//! Modelled on the teacher's `BankingConfig` (`datasynth-banking::config`):
//! a `#[serde(default = ...)]`-annotated struct, named presets for common
//! deployment shapes, and a `validate() -> Result<(), Vec<String>>` that
//! collects every problem rather than failing on the first one.

use std::collections::HashSet;
use std::env;

use serde::{Deserialize, Serialize};

fn default_tau() -> f64 {
    0.80
}

fn default_layer1_batch_size() -> usize {
    10
}

fn default_layer1_concurrency() -> usize {
    10
}

fn default_agentic_workers() -> usize {
    5
}

fn default_agentic_drain_timeout_secs() -> u64 {
    120
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_receipt_match_min_confidence() -> f64 {
    0.6
}

fn default_analysis_window_months() -> u32 {
    3
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_catalog_write_tolerance_minor() -> u64 {
    50
}

/// The cascade's complete runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Cascade-stop confidence threshold (τ), default 0.80.
    #[serde(default = "default_tau")]
    pub tau: f64,
    /// Layer-1 external enrichment batch size, default 10.
    #[serde(default = "default_layer1_batch_size")]
    pub layer1_batch_size: usize,
    /// Layer-1 maximum in-flight provider calls, default 10.
    #[serde(default = "default_layer1_concurrency")]
    pub layer1_concurrency: usize,
    /// Agentic queue worker pool size (W), default 5.
    #[serde(default = "default_agentic_workers")]
    pub agentic_workers: usize,
    /// Overall deadline for draining the agentic queue, default 120s.
    #[serde(default = "default_agentic_drain_timeout_secs")]
    pub agentic_drain_timeout_secs: u64,
    /// Per-call timeout for any single external provider call, default 10s.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Minimum total score for the receipt matcher to accept a match.
    #[serde(default = "default_receipt_match_min_confidence")]
    pub receipt_match_min_confidence: f64,
    /// Number of trailing complete months the budget aggregator averages
    /// over (H), default 3.
    #[serde(default = "default_analysis_window_months")]
    pub analysis_window_months: u32,
    /// Tolerance, in minor units, used by the subscription matcher when its
    /// own writes re-read the catalog (Open Question (a); see DESIGN.md).
    #[serde(default = "default_catalog_write_tolerance_minor")]
    pub catalog_write_tolerance_minor: u64,
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// API keys accepted by the minimal auth gate. Empty means auth is
    /// disabled (development mode).
    #[serde(default)]
    pub api_keys: HashSet<String>,
    /// Base URL of the hosting application's persistence callback
    /// (`/internal/enrichment-update`). `None` disables the callback.
    #[serde(default)]
    pub hosting_callback_base_url: Option<String>,
    /// Endpoint for the Layer-1 merchant/category enrichment provider.
    #[serde(default)]
    pub merchant_provider_url: Option<String>,
    /// Endpoint for the subscription matcher's web-search fallback.
    #[serde(default)]
    pub search_provider_url: Option<String>,
    /// Endpoint for the LLM completion provider (subscription matcher and
    /// Sherlock fallback).
    #[serde(default)]
    pub llm_provider_url: Option<String>,
    /// Endpoint for the email-receipt provider.
    #[serde(default)]
    pub email_provider_url: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            tau: default_tau(),
            layer1_batch_size: default_layer1_batch_size(),
            layer1_concurrency: default_layer1_concurrency(),
            agentic_workers: default_agentic_workers(),
            agentic_drain_timeout_secs: default_agentic_drain_timeout_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            receipt_match_min_confidence: default_receipt_match_min_confidence(),
            analysis_window_months: default_analysis_window_months(),
            catalog_write_tolerance_minor: default_catalog_write_tolerance_minor(),
            bind_address: default_bind_address(),
            api_keys: HashSet::new(),
            hosting_callback_base_url: None,
            merchant_provider_url: None,
            search_provider_url: None,
            llm_provider_url: None,
            email_provider_url: None,
        }
    }
}

impl EnrichmentConfig {
    /// A configuration with a single worker and a short drain timeout,
    /// convenient for unit and integration tests.
    pub fn test_preset() -> Self {
        Self {
            agentic_workers: 1,
            agentic_drain_timeout_secs: 5,
            provider_timeout_secs: 2,
            ..Default::default()
        }
    }

    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset. Recognised variables:
    /// `RESOLVE_TAU`, `RESOLVE_LAYER1_BATCH_SIZE`, `RESOLVE_LAYER1_CONCURRENCY`,
    /// `RESOLVE_AGENTIC_WORKERS`, `RESOLVE_AGENTIC_DRAIN_TIMEOUT_SECS`,
    /// `RESOLVE_PROVIDER_TIMEOUT_SECS`, `RESOLVE_RECEIPT_MATCH_MIN_CONFIDENCE`,
    /// `RESOLVE_ANALYSIS_WINDOW_MONTHS`, `RESOLVE_CATALOG_WRITE_TOLERANCE_MINOR`,
    /// `RESOLVE_BIND_ADDRESS`, `RESOLVE_API_KEYS` (comma-separated),
    /// `RESOLVE_HOSTING_CALLBACK_BASE_URL`, `RESOLVE_MERCHANT_PROVIDER_URL`,
    /// `RESOLVE_SEARCH_PROVIDER_URL`, `RESOLVE_LLM_PROVIDER_URL`,
    /// `RESOLVE_EMAIL_PROVIDER_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parsed("RESOLVE_TAU") {
            config.tau = v;
        }
        if let Some(v) = env_parsed("RESOLVE_LAYER1_BATCH_SIZE") {
            config.layer1_batch_size = v;
        }
        if let Some(v) = env_parsed("RESOLVE_LAYER1_CONCURRENCY") {
            config.layer1_concurrency = v;
        }
        if let Some(v) = env_parsed("RESOLVE_AGENTIC_WORKERS") {
            config.agentic_workers = v;
        }
        if let Some(v) = env_parsed("RESOLVE_AGENTIC_DRAIN_TIMEOUT_SECS") {
            config.agentic_drain_timeout_secs = v;
        }
        if let Some(v) = env_parsed("RESOLVE_PROVIDER_TIMEOUT_SECS") {
            config.provider_timeout_secs = v;
        }
        if let Some(v) = env_parsed("RESOLVE_RECEIPT_MATCH_MIN_CONFIDENCE") {
            config.receipt_match_min_confidence = v;
        }
        if let Some(v) = env_parsed("RESOLVE_ANALYSIS_WINDOW_MONTHS") {
            config.analysis_window_months = v;
        }
        if let Some(v) = env_parsed("RESOLVE_CATALOG_WRITE_TOLERANCE_MINOR") {
            config.catalog_write_tolerance_minor = v;
        }
        if let Ok(v) = env::var("RESOLVE_BIND_ADDRESS") {
            config.bind_address = v;
        }
        if let Ok(v) = env::var("RESOLVE_API_KEYS") {
            config.api_keys = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("RESOLVE_HOSTING_CALLBACK_BASE_URL") {
            config.hosting_callback_base_url = Some(v);
        }
        if let Ok(v) = env::var("RESOLVE_MERCHANT_PROVIDER_URL") {
            config.merchant_provider_url = Some(v);
        }
        if let Ok(v) = env::var("RESOLVE_SEARCH_PROVIDER_URL") {
            config.search_provider_url = Some(v);
        }
        if let Ok(v) = env::var("RESOLVE_LLM_PROVIDER_URL") {
            config.llm_provider_url = Some(v);
        }
        if let Ok(v) = env::var("RESOLVE_EMAIL_PROVIDER_URL") {
            config.email_provider_url = Some(v);
        }

        config
    }

    /// Validates the configuration, collecting every problem rather than
    /// stopping at the first one (mirrors the teacher's
    /// `BankingConfig::validate`). A non-empty result is the system's single
    /// Fatal error path at startup.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.tau) {
            errors.push(format!("tau must be within [0,1], got {}", self.tau));
        }
        if self.layer1_batch_size == 0 {
            errors.push("layer1_batch_size must be non-zero".to_string());
        }
        if self.layer1_concurrency == 0 {
            errors.push("layer1_concurrency must be non-zero".to_string());
        }
        if self.agentic_workers == 0 {
            errors.push("agentic_workers must be non-zero".to_string());
        }
        if self.agentic_drain_timeout_secs == 0 {
            errors.push("agentic_drain_timeout_secs must be non-zero".to_string());
        }
        if self.provider_timeout_secs == 0 {
            errors.push("provider_timeout_secs must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.receipt_match_min_confidence) {
            errors.push(format!(
                "receipt_match_min_confidence must be within [0,1], got {}",
                self.receipt_match_min_confidence
            ));
        }
        if self.analysis_window_months == 0 {
            errors.push("analysis_window_months must be non-zero".to_string());
        }
        if self.bind_address.is_empty() {
            errors.push("bind_address must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
