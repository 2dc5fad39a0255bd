//! Request/response payloads and handlers for the sync and job-polling REST
//! endpoints, per `spec.md` §6.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use resolve_agentic::WorkflowInputs;
use resolve_cascade::normalize;
use resolve_core::{BudgetCategory, EnrichedTx, EnrichmentJob, JobStatus, MerchantEnrichmentProvider, RawTx, ResolveError};
use resolve_runtime::{aggregate_budget, BudgetAnalysis, EnrichRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub transactions: Vec<RawTx>,
    pub user_id: String,
    pub connection_id: String,
    #[serde(default)]
    pub analysis_months: Option<u32>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub success: bool,
    pub enriched_transactions: Vec<EnrichedTx>,
    pub budget_analysis: BudgetAnalysis,
    pub detected_debts: Vec<EnrichedTx>,
    pub message: String,
}

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

pub(crate) fn build_request(payload: IngestPayload) -> EnrichRequest {
    EnrichRequest {
        raw_batch: payload.transactions,
        user_id: payload.user_id,
        connection_id: payload.connection_id,
        holder_name: payload.holder_name,
        country: payload.country,
        mail_grant: None,
    }
}

async fn run_to_completion<P: MerchantEnrichmentProvider + 'static>(
    orchestrator: Arc<resolve_runtime::StreamingOrchestrator<P>>,
    request: EnrichRequest,
) -> Vec<EnrichedTx> {
    let mut receiver = orchestrator.enrich_stream(request);
    let mut results = Vec::new();
    while let Some(event) = receiver.recv().await {
        match event {
            resolve_core::StreamEvent::Data(tx) => results.push(tx),
            resolve_core::StreamEvent::Complete(_) => break,
            _ => {}
        }
    }
    results
}

/// `POST /enrich-transactions`: runs the full cascade synchronously and
/// returns the complete batch plus a budget analysis.
pub async fn enrich_transactions<P: MerchantEnrichmentProvider + 'static>(
    State(state): State<AppState<P>>,
    Json(payload): Json<IngestPayload>,
) -> Result<Json<IngestResult>, (StatusCode, String)> {
    if payload.transactions.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "transactions must not be empty".to_string()));
    }
    let analysis_months = payload.analysis_months.unwrap_or(state.config.analysis_window_months);
    let request = build_request(payload);

    let enriched = run_to_completion(Arc::clone(&state.orchestrator), request).await;
    let budget_analysis = aggregate_budget(&enriched, &current_month(), analysis_months);
    let detected_debts = enriched
        .iter()
        .filter(|tx| tx.budget_category == BudgetCategory::Debt)
        .cloned()
        .collect();

    Ok(Json(IngestResult {
        success: true,
        enriched_transactions: enriched,
        budget_analysis,
        detected_debts,
        message: "enrichment complete".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct JobSubmission {
    pub transaction_ids: Vec<String>,
    pub transactions: Vec<EnrichedTx>,
    pub user_id: String,
    #[serde(default)]
    pub mail_grant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobSubmissionResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// `POST /api/enrich`: queues a batch of already-normalised transactions for
/// the agentic sub-workflow and returns a pollable job id. `transactions`
/// carries the Layer-1 results for the ids in `transaction_ids` — the job API
/// operates on records the caller already has, not raw aggregator feeds.
pub async fn submit_job<P: MerchantEnrichmentProvider + 'static>(
    State(state): State<AppState<P>>,
    Json(payload): Json<JobSubmission>,
) -> Result<Json<JobSubmissionResponse>, (StatusCode, String)> {
    if payload.transactions.len() != payload.transaction_ids.len() {
        return Err((
            StatusCode::BAD_REQUEST,
            "transactions must have one entry per transaction_id".to_string(),
        ));
    }

    let job_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let job = EnrichmentJob::new(job_id.clone(), payload.transaction_ids, now);
    state.jobs.lock().await.insert(job_id.clone(), job);

    let workflow = Arc::clone(&state.agentic_workflow);
    let jobs = Arc::clone(&state.jobs);
    let job_id_for_task = job_id.clone();
    // `EnrichedTx` doesn't carry its own currency; the job API has no raw
    // batch to derive one from, so it falls back to the cascade default.
    let currency = "GBP".to_string();
    let mail_grant = payload.mail_grant;
    let concurrency = state.config.agentic_workers;
    let transactions = payload.transactions;

    tokio::spawn(async move {
        if let Some(job) = jobs.lock().await.get_mut(&job_id_for_task) {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }

        let mut results = stream::iter(transactions.into_iter().map(|tx| {
            let workflow = Arc::clone(&workflow);
            let currency = currency.clone();
            let mail_grant = mail_grant.clone();
            async move {
                workflow
                    .run(
                        tx,
                        WorkflowInputs {
                            currency: &currency,
                            mail_grant: mail_grant.as_deref(),
                            receipt_match: None,
                        },
                    )
                    .await
            }
        }))
        .buffer_unordered(concurrency.max(1));

        while let Some(result) = results.next().await {
            if let Some(job) = jobs.lock().await.get_mut(&job_id_for_task) {
                job.push_result(result);
            }
        }

        if let Some(job) = jobs.lock().await.get_mut(&job_id_for_task) {
            job.finish(Utc::now());
        }
    });

    Ok(Json(JobSubmissionResponse {
        job_id,
        status: JobStatus::Pending,
        message: "job accepted".to_string(),
    }))
}

/// `GET /api/enrich/{job_id}`.
pub async fn get_job<P: MerchantEnrichmentProvider + 'static>(
    State(state): State<AppState<P>>,
    Path(job_id): Path<String>,
) -> Result<Json<EnrichmentJob>, StatusCode> {
    let jobs = state.jobs.lock().await;
    jobs.get(&job_id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
pub struct SingleTxPayload {
    pub transaction: RawTx,
    #[serde(default)]
    pub mail_grant: Option<String>,
}

/// `POST /api/enrich/single`: the same cascade, run over exactly one
/// transaction, falling through to the agentic sub-workflow inline rather
/// than via the queue.
pub async fn enrich_single<P: MerchantEnrichmentProvider + 'static>(
    State(state): State<AppState<P>>,
    Json(payload): Json<SingleTxPayload>,
) -> Result<Json<EnrichedTx>, (StatusCode, String)> {
    let norm = normalize(&payload.transaction)
        .map_err(|e: ResolveError| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let currency = norm.currency.clone();

    let mut results = state.merchant_enricher.enrich_batch(std::slice::from_ref(&norm)).await;
    let layer1 = results.remove(0);

    let enriched = if layer1.needs_agentic {
        state
            .agentic_workflow
            .run(
                layer1.enriched,
                WorkflowInputs {
                    currency: &currency,
                    mail_grant: payload.mail_grant.as_deref(),
                    receipt_match: None,
                },
            )
            .await
    } else {
        layer1.enriched
    };

    Ok(Json(enriched))
}
