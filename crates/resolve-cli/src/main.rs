//! CLI for the transaction enrichment cascade.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resolve_agentic::{AgenticWorkflow, SubscriptionMatcher};
use resolve_cascade::MerchantEnricher;
use resolve_config::EnrichmentConfig;
use resolve_core::{BudgetCategory, EnrichedTx, RawTx, StreamEvent};
use resolve_runtime::{aggregate_budget, EnrichRequest, StreamingOrchestrator};
use resolve_server::catalog::InMemorySubscriptionCatalog;
use resolve_server::providers::{HttpLlmProvider, HttpMerchantProvider, HttpSearchProvider};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "resolve-data")]
#[command(about = "Batch runner for the transaction enrichment cascade")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full cascade over a JSON array of raw transactions
    Enrich {
        /// Path to a JSON file containing an array of raw transactions
        batch: PathBuf,

        /// Write the result JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// User id attributed to this batch
        #[arg(long, default_value = "cli-user")]
        user_id: String,

        /// Connection id attributed to this batch
        #[arg(long, default_value = "cli-connection")]
        connection_id: String,

        /// Trailing months the budget analysis averages over
        #[arg(long)]
        analysis_months: Option<u32>,
    },

    /// Validate a configuration loaded from the environment
    Validate,
}

#[derive(Serialize)]
struct EnrichOutput {
    enriched_transactions: Vec<EnrichedTx>,
    budget_analysis: resolve_runtime::BudgetAnalysis,
    detected_debts: Vec<EnrichedTx>,
}

fn build_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} enriching [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .expect("progress bar template uses only standard indicatif placeholders")
            .progress_chars("#>-"),
    );
    pb
}

async fn run_enrich(
    batch: PathBuf,
    output: Option<PathBuf>,
    user_id: String,
    connection_id: String,
    analysis_months: Option<u32>,
) -> Result<()> {
    let config = EnrichmentConfig::from_env();
    config.validate().map_err(|errors| anyhow::anyhow!("invalid configuration: {}", errors.join("; ")))?;

    let merchant_url = config
        .merchant_provider_url
        .clone()
        .context("RESOLVE_MERCHANT_PROVIDER_URL must be set to run the cascade")?;
    let llm_url = config
        .llm_provider_url
        .clone()
        .context("RESOLVE_LLM_PROVIDER_URL must be set to run the cascade")?;
    let search_url = config
        .search_provider_url
        .clone()
        .context("RESOLVE_SEARCH_PROVIDER_URL must be set to run the cascade")?;

    let raw_json = fs::read_to_string(&batch).with_context(|| format!("reading {}", batch.display()))?;
    let raw_batch: Vec<RawTx> = serde_json::from_str(&raw_json).context("parsing batch as a JSON array of raw transactions")?;
    let total = raw_batch.len();

    let timeout = Duration::from_secs(config.provider_timeout_secs);
    let merchant_enricher = Arc::new(MerchantEnricher::new(
        Arc::new(HttpMerchantProvider::new(merchant_url, timeout)?),
        config.layer1_concurrency,
        config.tau,
        timeout,
    ));
    let catalog = Arc::new(InMemorySubscriptionCatalog::new());
    let subscription_matcher = Arc::new(SubscriptionMatcher::new(
        catalog,
        Arc::new(HttpSearchProvider::new(search_url, timeout)?),
        Arc::new(HttpLlmProvider::new(llm_url.clone(), timeout)?),
    ));
    let agentic_workflow = Arc::new(AgenticWorkflow::new(
        subscription_matcher,
        Arc::new(HttpLlmProvider::new(llm_url, timeout)?),
        config.tau,
    ));
    let orchestrator = Arc::new(
        StreamingOrchestrator::new(merchant_enricher, agentic_workflow, config.tau, config.agentic_workers)
            .with_receipt_match_min_confidence(config.receipt_match_min_confidence)
            .with_agentic_drain_timeout(Duration::from_secs(config.agentic_drain_timeout_secs)),
    );

    let request = EnrichRequest {
        raw_batch,
        user_id,
        connection_id,
        holder_name: None,
        country: None,
        mail_grant: None,
    };

    let pb = build_progress_bar(total as u64);
    let mut receiver = orchestrator.enrich_stream(request);
    let mut enriched = Vec::with_capacity(total);
    while let Some(event) = receiver.recv().await {
        match event {
            StreamEvent::Data(tx) => enriched.push(tx),
            StreamEvent::Progress(progress) => pb.set_position(progress.layer1_completed.max(progress.agentic_completed) as u64),
            StreamEvent::Error(err) => pb.println(format!("error: {err}")),
            StreamEvent::Complete(_) => break,
        }
    }
    pb.finish_with_message("cascade complete");

    let current_month = chrono::Utc::now().format("%Y-%m").to_string();
    let analysis_months = analysis_months.unwrap_or(config.analysis_window_months);
    let budget_analysis = aggregate_budget(&enriched, &current_month, analysis_months);
    let detected_debts = enriched
        .iter()
        .filter(|tx| tx.budget_category == BudgetCategory::Debt)
        .cloned()
        .collect();

    let result = EnrichOutput {
        enriched_transactions: enriched,
        budget_analysis,
        detected_debts,
    };
    let rendered = serde_json::to_string_pretty(&result)?;

    match output {
        Some(path) => fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Enrich {
            batch,
            output,
            user_id,
            connection_id,
            analysis_months,
        } => runtime.block_on(run_enrich(batch, output, user_id, connection_id, analysis_months)),
        Commands::Validate => {
            let config = EnrichmentConfig::from_env();
            match config.validate() {
                Ok(()) => {
                    println!("configuration is valid");
                    Ok(())
                }
                Err(errors) => {
                    for e in &errors {
                        eprintln!("error: {e}");
                    }
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
            }
        }
    }
}
