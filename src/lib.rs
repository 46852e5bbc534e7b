// src/lib.rs
// Library crate so the binary and the integration tests share one surface.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod groups;
pub mod ingest;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod products;
pub mod report;
pub mod status;
pub mod store;
pub mod ticket;

// ---- Re-exports callers actually reach for ----
pub use crate::api::{create_router, AppState};
pub use crate::classify::{
    start_hot_reload_thread, Classification, ClassifierEngine, ClassifierHandle, Tier,
};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::pipeline::{run_once, NullObserver, RunGuard, RunReport, Stage, StageObserver};
pub use crate::report::{DailySummaryRow, DetailRow, TicketLedger};
pub use crate::status::{StatusBoard, SyncStatus};
pub use crate::ticket::{Category, Ticket};
