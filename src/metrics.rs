use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::classify::ClassifierEngine;

/// Global Prometheus recorder plus the `/metrics` exposition route.
///
/// Static facts about the loaded rule set are published as gauges here;
/// per-run counters are incremented by the pipeline itself.
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the recorder and publish the rule-set gauges. Call once at
    /// boot, before the first run.
    pub fn init(engine: &ClassifierEngine) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        gauge!("classifier_detail_threshold").set(engine.detail_threshold() as f64);
        gauge!("classifier_categories").set(engine.categories().len() as f64);
        gauge!("classifier_rules").set(engine.rule_count() as f64);

        Self { handle }
    }

    /// Router serving `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
