// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() -> anyhow::Result<()> {
    // 1. Logs
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "loop_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    // 2. Metrics (Prometheus)
    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("loop_entities_created_total", "Entities accepted, by entity type");
    metrics::describe_counter!("loop_events_appended_total", "Ledger events appended, by origin");
    metrics::describe_histogram!("loop_ledger_commit_duration_seconds", "Time to validate and commit one ledger write");
    metrics::describe_gauge!("loop_stream_subscribers", "Currently open stream subscribers");
    metrics::describe_counter!("loop_stream_rejected_total", "Stream subscribes refused at capacity");
    metrics::describe_counter!("loop_stream_evicted_total", "Stream subscribers closed after a failed write");
    metrics::describe_counter!("loop_federation_handshakes_total", "Handshakes accepted or acknowledged");
    metrics::describe_counter!("loop_forward_failures_total", "Events that could not be forwarded to a peer");

    metrics::gauge!("loop_node_up", 1.0);
    Ok(())
}

/// Prometheus text exposition for `/metrics`.
pub fn render_metrics() -> String {
    match PROM_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# metrics not initialized\n".to_string(),
    }
}
