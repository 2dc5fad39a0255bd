//! `POST /enrich-transactions-stream`: the chunked `data: <json>\n\n` stream
//! from `spec.md` §6. Adapted from the teacher's `rest/websocket.rs`
//! axum-state-plus-event-loop shape, re-purposed for a one-shot SSE response
//! instead of a long-lived bidirectional socket — the cascade only ever
//! pushes, it never needs to read frames back from the client mid-stream.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures::Stream;
use resolve_core::{
    BudgetCategory, EnrichedTx, MerchantEnrichmentProvider, StreamEvent, StreamProgress, StreamReceiver, StreamSummary,
};
use resolve_runtime::{aggregate_budget, BudgetAnalysis};
use serde::Serialize;

use crate::rest::handlers::{IngestPayload, IngestResult};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseFrame {
    Progress {
        current: usize,
        total: usize,
        status: String,
        #[serde(rename = "startTime")]
        start_time_ms: u64,
        #[serde(flatten)]
        progress: StreamProgress,
    },
    Complete {
        result: IngestResult,
        stats: StreamSummary,
    },
    Error {
        message: String,
    },
}

impl SseFrame {
    fn into_event(self) -> Event {
        Event::default().data(serde_json::to_string(&self).unwrap_or_else(|_| {
            "{\"type\":\"error\",\"message\":\"failed to serialize event\"}".to_string()
        }))
    }
}

struct StreamState {
    receiver: StreamReceiver<EnrichedTx>,
    collected: Vec<EnrichedTx>,
    analysis_months: u32,
    started_at_ms: u64,
    done: bool,
}

/// `POST /enrich-transactions-stream`. Emits `progress` frames as the batch
/// moves through the cascade, accumulates every `EnrichedTx` the orchestrator
/// produces, and emits a single terminal `complete` frame carrying the full
/// result shape (or an `error` frame if the batch itself couldn't be
/// normalised at all).
pub async fn enrich_transactions_stream<P: MerchantEnrichmentProvider + 'static>(
    State(state): State<AppState<P>>,
    Json(payload): Json<IngestPayload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let analysis_months = payload.analysis_months.unwrap_or(state.config.analysis_window_months);
    let request = super::handlers::build_request(payload);
    let receiver = state.orchestrator.enrich_stream(request);

    let initial = StreamState {
        receiver,
        collected: Vec::new(),
        analysis_months,
        started_at_ms: Utc::now().timestamp_millis().max(0) as u64,
        done: false,
    };

    let stream = futures::stream::unfold(initial, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            match st.receiver.recv().await {
                Some(StreamEvent::Data(tx)) => {
                    st.collected.push(tx);
                    continue;
                }
                Some(StreamEvent::Progress(progress)) => {
                    let current = progress.layer1_completed.max(progress.agentic_completed);
                    let frame = SseFrame::Progress {
                        current,
                        total: progress.total,
                        status: progress.phase.clone(),
                        start_time_ms: st.started_at_ms,
                        progress,
                    };
                    return Some((Ok(frame.into_event()), st));
                }
                Some(StreamEvent::Error(err)) => {
                    let frame = SseFrame::Error { message: err.to_string() };
                    return Some((Ok(frame.into_event()), st));
                }
                Some(StreamEvent::Complete(summary)) => {
                    let current_month = Utc::now().format("%Y-%m").to_string();
                    let budget_analysis: BudgetAnalysis =
                        aggregate_budget(&st.collected, &current_month, st.analysis_months);
                    let detected_debts = st
                        .collected
                        .iter()
                        .filter(|tx| tx.budget_category == BudgetCategory::Debt)
                        .cloned()
                        .collect();
                    let frame = SseFrame::Complete {
                        result: IngestResult {
                            success: true,
                            enriched_transactions: st.collected.clone(),
                            budget_analysis,
                            detected_debts,
                            message: "enrichment complete".to_string(),
                        },
                        stats: summary,
                    };
                    st.done = true;
                    return Some((Ok(frame.into_event()), st));
                }
                None => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
