//! Prometheus metrics exposition
//!
//! Registered metrics:
//!
//! - `gateway_requests_total` (counter): labels `status`, `method`
//! - `gateway_request_duration_seconds` (histogram): label `status`
//! - `gateway_auth_failures_total` (counter): label `reason`
//! - `gateway_upstream_errors_total` (counter): label `dependency`
//!
//! The `dependency` label separates record-store failures (`websim`) from
//! generation API failures (`sonauto`). Both surface as 500s, so the
//! label is the only place the distinction is visible to operators.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `gateway_request_duration_seconds` with explicit buckets so
/// it renders as a histogram (with `_bucket` lines) rather than a summary.
/// Boundaries cover 5ms to 60s, matching the configurable outbound timeout
/// range.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "gateway_request_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed forwarding request with status code and method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("gateway_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record a request rejected at the authorization gate.
pub fn record_auth_failure(reason: &str) {
    metrics::counter!("gateway_auth_failures_total", "reason" => reason.to_string()).increment(1);
}

/// Record an outbound dependency failure.
pub fn record_upstream_error(dependency: &str) {
    metrics::counter!("gateway_upstream_errors_total", "dependency" => dependency.to_string())
        .increment(1);
}

/// Process-local counters surfaced by the health endpoint.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub started_at: Instant,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
