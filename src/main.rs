//! Helpdesk Ticket Analyzer — Binary Entrypoint
//! Stands up the Axum server: routes, shared state, metrics, dev rule watcher.
//!
//! See `README.md` for quickstart and configuration.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use helpdesk_ticket_analyzer::api::{create_router, AppState};
use helpdesk_ticket_analyzer::classify::{
    start_hot_reload_thread, ClassifierEngine, ClassifierHandle,
};
use helpdesk_ticket_analyzer::config::ServiceConfig;
use helpdesk_ticket_analyzer::ingest::types::JsonFileTicketSource;
use helpdesk_ticket_analyzer::metrics::Metrics;
use helpdesk_ticket_analyzer::pipeline::RunGuard;
use helpdesk_ticket_analyzer::status::StatusBoard;
use helpdesk_ticket_analyzer::store::JsonFileLedgerStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("helpdesk_ticket_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up .env when present; deployed environments set real vars.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ServiceConfig::from_env()?;

    // --- Initialize the classification engine ---
    // Configuration errors are fatal here, before any ticket is touched.
    let engine = ClassifierEngine::from_toml()?;
    tracing::info!(
        categories = engine.categories().len(),
        rules = engine.rule_count(),
        detail_threshold = engine.detail_threshold(),
        "classifier loaded"
    );
    let classifier = ClassifierHandle::new(engine);

    // If hot reload is enabled, spawn the background watcher.
    start_hot_reload_thread(classifier.clone(), cfg.classifier_config_path.clone());

    let metrics = Metrics::init(&classifier.snapshot());

    let state = AppState {
        classifier,
        source: Arc::new(JsonFileTicketSource::new(&cfg.ticket_export_path)),
        store: Arc::new(JsonFileLedgerStore::new(&cfg.ledger_dir)),
        status: Arc::new(StatusBoard::new()),
        run_guard: RunGuard::new(),
    };

    let router = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
