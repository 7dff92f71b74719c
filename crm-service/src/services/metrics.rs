//! Metrics collection for crm-service.
//!
//! Counters go through the `metrics` facade; until `init_metrics` installs
//! the Prometheus recorder they are no-ops, which keeps tests quiet.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once, from `main`.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "failed to install Prometheus recorder: {}",
            e
        ))
    })?;

    METRICS_HANDLE.set(handle).map_err(|_| {
        AppError::InternalError(anyhow::anyhow!("metrics handle already initialized"))
    })
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_sweep(duration_secs: f64, dispatched: usize) {
    metrics::counter!("crm_reminder_sweeps_total").increment(1);
    metrics::histogram!("crm_reminder_sweep_duration_seconds").record(duration_secs);
    metrics::gauge!("crm_reminder_last_sweep_dispatched").set(dispatched as f64);
}

pub fn record_dispatch(channel: &str) {
    metrics::counter!("crm_reminders_dispatched_total", "channel" => channel.to_string())
        .increment(1);
}

pub fn record_duplicate(channel: &str) {
    metrics::counter!("crm_reminders_deduplicated_total", "channel" => channel.to_string())
        .increment(1);
}

/// `kind` is `fetch` or `dispatch`.
pub fn record_failure(kind: &'static str, channel: &str) {
    metrics::counter!(
        "crm_reminder_failures_total",
        "kind" => kind,
        "channel" => channel.to_string()
    )
    .increment(1);
}

pub fn record_live_event(channel: &str) {
    metrics::counter!("crm_live_events_total", "channel" => channel.to_string()).increment(1);
}

pub fn record_provider_call(provider: &'static str, ok: bool) {
    let status = if ok { "success" } else { "failure" };
    metrics::counter!(
        "crm_provider_calls_total",
        "provider" => provider,
        "status" => status
    )
    .increment(1);
}
