//! Prometheus metrics for profilehub.
//!
//! - [`MetricsConfig`] / [`init_metrics`]: install the Prometheus recorder
//! - [`metrics_handler`]: `/metrics` endpoint (server topology only)
//! - connection and invocation counters recorded by [`AppState`](crate::AppState)
//!   and the function adapter
//!
//! HTTP request metrics are recorded by [`TelemetryLayer`](crate::TelemetryLayer).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use profilehub_lib::{ConnectionError, DatabaseHandle, DeploymentTopology};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// `METRICS_ENABLED`: anything but "false" enables metrics.
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self { enabled }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("metrics are disabled")]
    Disabled,
    #[error("metrics recorder already initialized")]
    AlreadyInitialized,
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// Returns Prometheus exposition format text.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// Count one `ensure_connection` outcome.
///
/// `profilehub_connection_ensure_total{topology, outcome}` where outcome is
/// `connected`, `timeout` or `failed`.
pub fn record_connection_outcome(
    topology: DeploymentTopology,
    outcome: &Result<DatabaseHandle, ConnectionError>,
) {
    let outcome = match outcome {
        Ok(_) => "connected",
        Err(ConnectionError::TimedOut(_)) => "timeout",
        Err(_) => "failed",
    };
    metrics::counter!(
        "profilehub_connection_ensure_total",
        "topology" => topology.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Count one function invocation, labelled `delegated` or `short_circuited`.
pub fn record_invocation(topology: DeploymentTopology, delegated: bool) {
    let outcome = if delegated {
        "delegated"
    } else {
        "short_circuited"
    };
    metrics::counter!(
        "profilehub_invocations_total",
        "topology" => topology.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
