//! Builds the axum `Router` for the enrichment server: the sync and SSE
//! ingest endpoints, the agentic job API, the single-tx endpoint, and the
//! health/readiness/liveness/metrics probes the auth middleware exempts by
//! default.

use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use resolve_core::MerchantEnrichmentProvider;
use serde_json::json;

use crate::rest::auth::{auth_middleware, AuthConfig};
use crate::rest::handlers::{enrich_single, enrich_transactions, get_job, submit_job};
use crate::rest::sse::enrich_transactions_stream;
use crate::state::AppState;

/// The probe routes below, and the single source of truth
/// [`AuthConfig`](crate::rest::auth::AuthConfig)'s default exempt set reads
/// from — a load balancer's health checks never carry an API key.
pub const PROBE_PATHS: &[&str] = &["/health", "/ready", "/live", "/metrics"];

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn ready() -> Json<serde_json::Value> {
    Json(json!({"status": "ready"}))
}

async fn metrics<P: MerchantEnrichmentProvider + 'static>(
    axum::extract::State(state): axum::extract::State<AppState<P>>,
) -> Json<serde_json::Value> {
    let jobs = state.jobs.lock().await;
    Json(json!({"jobs_in_flight": jobs.len()}))
}

pub fn build_router<P: MerchantEnrichmentProvider + 'static>(state: AppState<P>, auth: AuthConfig) -> Router {
    Router::new()
        .route("/enrich-transactions", post(enrich_transactions::<P>))
        .route("/enrich-transactions-stream", post(enrich_transactions_stream::<P>))
        .route("/api/enrich", post(submit_job::<P>))
        .route("/api/enrich/:job_id", get(get_job::<P>))
        .route("/api/enrich/single", post(enrich_single::<P>))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(health))
        .route("/metrics", get(metrics::<P>))
        .layer(middleware::from_fn(auth_middleware))
        .layer(Extension(auth))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use resolve_agentic::{subscription::SubscriptionMatcher, AgenticWorkflow};
    use resolve_cascade::MerchantEnricher;
    use resolve_config::EnrichmentConfig;
    use resolve_test_utils::mocks::{
        FailingLlmProvider, FixedSearchProvider, InMemoryCatalog, ScriptedMerchantProvider,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState<ScriptedMerchantProvider> {
        let config = EnrichmentConfig::test_preset();
        let merchant_enricher = Arc::new(MerchantEnricher::new(
            Arc::new(ScriptedMerchantProvider::default()),
            config.layer1_concurrency,
            config.tau,
            Duration::from_secs(config.provider_timeout_secs),
        ));
        let subscription_matcher = Arc::new(SubscriptionMatcher::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(FixedSearchProvider::default()),
            Arc::new(FailingLlmProvider),
        ));
        let agentic_workflow = Arc::new(AgenticWorkflow::new(subscription_matcher, Arc::new(FailingLlmProvider), config.tau));
        let orchestrator = Arc::new(resolve_runtime::StreamingOrchestrator::new(
            Arc::clone(&merchant_enricher),
            Arc::clone(&agentic_workflow),
            config.tau,
            config.agentic_workers,
        ));
        AppState {
            orchestrator,
            merchant_enricher,
            agentic_workflow,
            config,
            jobs: Arc::new(tokio::sync::Mutex::new(std::collections::HashMap::new())),
        }
    }

    #[tokio::test]
    async fn probe_paths_are_exempt_without_auth() {
        for path in PROBE_PATHS {
            let router = build_router(test_state(), AuthConfig::with_api_keys(vec!["secret".into()]));
            let request = Request::builder().uri(*path).body(Body::empty()).unwrap();
            let response = router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path} should be exempt from auth");
        }
    }

    #[tokio::test]
    async fn ingest_requires_auth_when_enabled() {
        let router = build_router(test_state(), AuthConfig::with_api_keys(vec!["secret".into()]));
        let request = Request::builder()
            .method("POST")
            .uri("/enrich-transactions")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
