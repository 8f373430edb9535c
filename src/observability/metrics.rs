//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define backend metrics (mutations, validations, restart jobs)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `routectl_mutations_total` (counter): commit attempts by op, outcome
//! - `routectl_validations_total` (counter): checker runs by outcome
//! - `routectl_rollback_jobs_total` (counter): finished restart jobs by state
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   deployments without the exporter pay nothing

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_mutation(op: &'static str, outcome: &'static str) {
    metrics::counter!("routectl_mutations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_validation(outcome: &'static str) {
    metrics::counter!("routectl_validations_total", "outcome" => outcome).increment(1);
}

pub fn record_rollback_job(state: &'static str) {
    metrics::counter!("routectl_rollback_jobs_total", "state" => state).increment(1);
}
