//! Enrichment cascade REST/SSE server.
//!
//! Loads `EnrichmentConfig` from the environment, wires the HTTP provider
//! adapters and in-memory catalog into a `StreamingOrchestrator`, and serves
//! the router from `resolve_server::rest` with graceful shutdown.

use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use resolve_agentic::{AgenticWorkflow, SubscriptionMatcher};
use resolve_cascade::MerchantEnricher;
use resolve_config::EnrichmentConfig;
use resolve_core::ResolveError;
use resolve_runtime::StreamingOrchestrator;
use resolve_server::catalog::InMemorySubscriptionCatalog;
use resolve_server::persistence::HttpPersistenceCallback;
use resolve_server::providers::{HttpEmailProvider, HttpLlmProvider, HttpMerchantProvider, HttpSearchProvider};
use resolve_server::rest::auth::AuthConfig;
use resolve_server::state::AppState;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resolve-server")]
#[command(about = "Transaction enrichment cascade REST/SSE server", long_about = None)]
struct Args {
    /// Enable verbose (debug) logging regardless of RUST_LOG.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("server panic: {}", panic_info);
        default_hook(panic_info);
    }));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}

/// Startup-only checks beyond `EnrichmentConfig::validate()`: the collaborator
/// endpoints a running server actually needs. `resolve-config` leaves these
/// optional since its test/CLI consumers wire in mocked providers instead.
fn require_provider_urls(config: &EnrichmentConfig) -> Result<(), ResolveError> {
    if config.merchant_provider_url.is_none() {
        return Err(ResolveError::config("RESOLVE_MERCHANT_PROVIDER_URL is required to start the server"));
    }
    if config.llm_provider_url.is_none() {
        return Err(ResolveError::config("RESOLVE_LLM_PROVIDER_URL is required to start the server"));
    }
    if config.search_provider_url.is_none() {
        return Err(ResolveError::config("RESOLVE_SEARCH_PROVIDER_URL is required to start the server"));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_panic_hook();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).json().init();

    let config = EnrichmentConfig::from_env();
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config error: {e}");
        }
        return Err(format!("invalid configuration: {}", errors.join("; ")).into());
    }
    require_provider_urls(&config)?;

    let provider_timeout = Duration::from_secs(config.provider_timeout_secs);
    let merchant_provider = HttpMerchantProvider::new(
        config.merchant_provider_url.clone().expect("checked above"),
        provider_timeout,
    )?;
    let search_provider = HttpSearchProvider::new(
        config.search_provider_url.clone().expect("checked above"),
        provider_timeout,
    )?;
    let llm_provider = HttpLlmProvider::new(config.llm_provider_url.clone().expect("checked above"), provider_timeout)?;

    let merchant_enricher = Arc::new(MerchantEnricher::new(
        Arc::new(merchant_provider),
        config.layer1_concurrency,
        config.tau,
        provider_timeout,
    ));

    let catalog = Arc::new(InMemorySubscriptionCatalog::new());
    let subscription_matcher = Arc::new(SubscriptionMatcher::new(catalog, Arc::new(search_provider), Arc::new(llm_provider)));
    let agentic_llm = HttpLlmProvider::new(config.llm_provider_url.clone().expect("checked above"), provider_timeout)?;
    let agentic_workflow = Arc::new(AgenticWorkflow::new(subscription_matcher, Arc::new(agentic_llm), config.tau));

    let mut orchestrator_builder = StreamingOrchestrator::new(
        Arc::clone(&merchant_enricher),
        Arc::clone(&agentic_workflow),
        config.tau,
        config.agentic_workers,
    )
    .with_receipt_match_min_confidence(config.receipt_match_min_confidence)
    .with_agentic_drain_timeout(Duration::from_secs(config.agentic_drain_timeout_secs));

    if let Some(email_url) = &config.email_provider_url {
        let email_provider = HttpEmailProvider::new(email_url.clone(), provider_timeout)?;
        orchestrator_builder = orchestrator_builder.with_email_provider(Arc::new(email_provider));
    }
    if let Some(callback_url) = &config.hosting_callback_base_url {
        orchestrator_builder = orchestrator_builder.with_persistence(Arc::new(HttpPersistenceCallback::new(callback_url)));
    }

    let state = AppState {
        orchestrator: Arc::new(orchestrator_builder),
        merchant_enricher,
        agentic_workflow,
        jobs: Arc::new(tokio::sync::Mutex::new(std::collections::HashMap::new())),
        config: config.clone(),
    };

    let auth = if config.api_keys.is_empty() {
        AuthConfig::default()
    } else {
        AuthConfig::with_api_keys(config.api_keys.iter().cloned().collect())
    };

    let router = resolve_server::rest::build_router(state, auth);

    let addr: std::net::SocketAddr = config.bind_address.parse().map_err(|e| format!("invalid bind_address: {e}"))?;
    info!(%addr, "starting enrichment cascade server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    info!("server shutdown complete");
    Ok(())
}
