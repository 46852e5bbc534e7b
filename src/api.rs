use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use tower_http::cors::CorsLayer;

use crate::classify::{Classification, ClassifierHandle};
use crate::ingest::types::TicketSource;
use crate::pipeline::{self, RunGuard};
use crate::status::{StatusBoard, StatusSnapshot};
use crate::store::LedgerStore;
use crate::ticket::Ticket;

#[derive(Clone)]
pub struct AppState {
    pub classifier: ClassifierHandle,
    pub source: Arc<dyn TicketSource>,
    pub store: Arc<dyn LedgerStore>,
    pub status: Arc<StatusBoard>,
    pub run_guard: RunGuard,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sync", post(sync))
        .route("/status", get(status))
        .route("/report/latest", get(report_latest))
        .route("/classify", post(classify_one))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize, Default)]
struct SyncReq {
    /// Batch date to process; today (UTC) when omitted.
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(serde::Serialize)]
struct SyncResp {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_date: Option<NaiveDate>,
}

/// Kick off one pipeline run in the background. While a run holds the
/// permit, further triggers get 409 instead of a queued duplicate.
async fn sync(State(state): State<AppState>, body: Option<Json<SyncReq>>) -> Response {
    let Some(permit) = state.run_guard.try_begin() else {
        return (
            StatusCode::CONFLICT,
            Json(SyncResp {
                status: "already_running",
                batch_date: None,
            }),
        )
            .into_response();
    };

    let batch_date = body
        .and_then(|Json(req)| req.date)
        .unwrap_or_else(|| Utc::now().date_naive());

    state.status.mark_running();

    let engine = state.classifier.snapshot();
    let source = state.source.clone();
    let store = state.store.clone();
    let status = state.status.clone();
    tokio::spawn(async move {
        let result = pipeline::run_once(
            source.as_ref(),
            store.as_ref(),
            &engine,
            batch_date,
            status.as_ref(),
            &permit,
        )
        .await;
        match result {
            Ok(report) => status.mark_completed(report),
            Err(e) => {
                tracing::error!(target: "pipeline", error = %e, %batch_date, "run failed");
                status.mark_failed(e.to_string());
            }
        }
        // permit drops here; the next /sync may begin.
    });

    (
        StatusCode::ACCEPTED,
        Json(SyncResp {
            status: "started",
            batch_date: Some(batch_date),
        }),
    )
        .into_response()
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

async fn report_latest(
    State(state): State<AppState>,
) -> Result<Json<crate::report::TicketLedger>, (StatusCode, String)> {
    state
        .store
        .load()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(serde::Deserialize)]
struct ClassifyReq {
    subject: String,
    group: String,
    #[serde(default)]
    action_taken: Option<String>,
    #[serde(default)]
    existing_product: Option<String>,
}

/// Classify a single ad-hoc ticket. Dry-run surface for rule authors;
/// nothing is recorded.
async fn classify_one(
    State(state): State<AppState>,
    Json(req): Json<ClassifyReq>,
) -> Json<Classification> {
    let mut ticket = Ticket::new(0, req.subject, req.group, Utc::now().date_naive());
    ticket.action_taken = req.action_taken;
    ticket.existing_product = req.existing_product;

    let engine = state.classifier.snapshot();
    Json(engine.categorize(&ticket))
}
