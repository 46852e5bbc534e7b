// src/pipeline.rs
//! Pipeline orchestration: one daily batch from fetch to persisted ledger.
//!
//! `run_once` is the whole story: fetch the batch window, normalize,
//! categorize with the engine snapshot the caller handed in, aggregate,
//! merge into history, persist. Stage completions are reported through a
//! [`StageObserver`] so a status surface can show progress without the
//! pipeline knowing it exists.

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::aggregate::{aggregate, AggregationConfig};
use crate::classify::ClassifierEngine;
use crate::error::PipelineError;
use crate::ingest::normalize_tickets;
use crate::ingest::types::TicketSource;
use crate::merge::merge_batch;
use crate::store::LedgerStore;
use crate::ticket::{Category, Ticket};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Normalize,
    Classify,
    Aggregate,
    Merge,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Classify => "classify",
            Stage::Aggregate => "aggregate",
            Stage::Merge => "merge",
            Stage::Persist => "persist",
        }
    }
}

/// Receives one event per completed stage with the record count that stage
/// produced.
pub trait StageObserver: Send + Sync {
    fn stage_completed(&self, stage: Stage, records: usize);
}

/// Observer that drops every event.
pub struct NullObserver;

impl StageObserver for NullObserver {
    fn stage_completed(&self, _stage: Stage, _records: usize) {}
}

/// What one run did, returned to the caller and exposed on /status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub batch_date: NaiveDate,
    pub fetched: usize,
    pub rejected: usize,
    pub classified: usize,
    pub summary_rows: usize,
    pub detail_rows: usize,
    pub ledger_summary_rows: usize,
    pub ledger_detail_rows: usize,
    pub started_unix: u64,
    pub finished_unix: u64,
}

/// Run-level mutual exclusion. The ledger read-modify-write window must
/// never interleave, so at most one permit exists at a time and `run_once`
/// requires a reference to it.
#[derive(Clone, Default)]
pub struct RunGuard {
    inner: Arc<tokio::sync::Mutex<()>>,
}

/// Proof that the caller holds the run slot. Dropping it frees the slot.
pub struct RunPermit {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another run holds the permit; callers reject, they do
    /// not queue.
    pub fn try_begin(&self) -> Option<RunPermit> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| RunPermit { _guard: guard })
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tickets_fetched_total", "Raw tickets pulled per batch window.");
        describe_counter!(
            "tickets_rejected_total",
            "Tickets dropped by validation during normalization."
        );
        describe_counter!("tickets_classified_total", "Tickets assigned a category.");
        describe_counter!(
            "report_summary_rows_total",
            "Summary rows produced by aggregation."
        );
        describe_counter!(
            "report_detail_rows_total",
            "Detail rows produced by aggregation."
        );
        describe_counter!("ledger_merges_total", "Completed ledger merges.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last completed."
        );
    });
}

fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Run the full pipeline for `batch_date`.
///
/// Every value the writes need is computed before the first write, so a
/// `LedgerWrite` error can be retried by calling again with the same
/// arguments.
pub async fn run_once(
    source: &dyn TicketSource,
    store: &dyn LedgerStore,
    engine: &ClassifierEngine,
    batch_date: NaiveDate,
    observer: &dyn StageObserver,
    _permit: &RunPermit,
) -> Result<RunReport, PipelineError> {
    ensure_metrics_described();
    let started_unix = now_unix();

    let raw = source
        .fetch_day(batch_date)
        .await
        .map_err(|e| PipelineError::source(format!("{} fetch: {e:#}", source.name())))?;
    let fetched = raw.len();
    counter!("tickets_fetched_total").increment(fetched as u64);
    observer.stage_completed(Stage::Fetch, fetched);

    let (tickets, rejected) = normalize_tickets(raw);
    counter!("tickets_rejected_total").increment(rejected as u64);
    observer.stage_completed(Stage::Normalize, tickets.len());

    let classified: Vec<(Ticket, Category)> = tickets
        .into_iter()
        .map(|t| {
            let category = engine.categorize(&t).category;
            (t, category)
        })
        .collect();
    counter!("tickets_classified_total").increment(classified.len() as u64);
    observer.stage_completed(Stage::Classify, classified.len());

    let agg = aggregate(
        &classified,
        &AggregationConfig {
            detail_threshold: engine.detail_threshold(),
        },
    );
    counter!("report_summary_rows_total").increment(agg.summary.len() as u64);
    counter!("report_detail_rows_total").increment(agg.detail.len() as u64);
    observer.stage_completed(Stage::Aggregate, agg.summary.len() + agg.detail.len());

    // Ledger read-modify-write. The permit the caller holds covers this
    // whole window; a parallel run could otherwise lose the replace.
    let ledger = store.load().await?;
    let summary_rows = agg.summary.len();
    let detail_rows = agg.detail.len();
    let outcome = merge_batch(ledger, agg.summary, agg.detail, batch_date);
    observer.stage_completed(
        Stage::Merge,
        outcome.updated.summary.len() + outcome.updated.detail.len(),
    );

    store.store(&outcome.updated, &outcome.backup).await?;
    counter!("ledger_merges_total").increment(1);
    observer.stage_completed(
        Stage::Persist,
        outcome.updated.summary.len() + outcome.updated.detail.len(),
    );

    let finished_unix = now_unix();
    gauge!("pipeline_last_run_ts").set(finished_unix as f64);

    let report = RunReport {
        batch_date,
        fetched,
        rejected,
        classified: classified.len(),
        summary_rows,
        detail_rows,
        ledger_summary_rows: outcome.updated.summary.len(),
        ledger_detail_rows: outcome.updated.detail.len(),
        started_unix,
        finished_unix,
    };

    tracing::info!(
        target: "pipeline",
        batch_date = %report.batch_date,
        fetched = report.fetched,
        rejected = report.rejected,
        summary_rows = report.summary_rows,
        detail_rows = report.detail_rows,
        replaced = outcome.replaced_summary + outcome.replaced_detail,
        "run completed"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_guard_rejects_second_permit() {
        let guard = RunGuard::new();
        let first = guard.try_begin();
        assert!(first.is_some());
        assert!(guard.try_begin().is_none());
        drop(first);
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Fetch.as_str(), "fetch");
        assert_eq!(Stage::Persist.as_str(), "persist");
        assert_eq!(
            serde_json::to_string(&Stage::Merge).unwrap(),
            "\"merge\""
        );
    }
}
