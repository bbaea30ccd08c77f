//! Prometheus recorder for `--metrics`
//!
//! The client and session crates emit through the `metrics` facade; this
//! installs the global recorder so a run can print its counters on exit.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use taskboard_client::metrics::REQUEST_DURATION_BUCKETS;

const DURATION_METRIC: &str = "taskboard_request_duration_seconds";

/// Builder with the request-duration histogram configured as real buckets
/// rather than a summary.
fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(DURATION_METRIC.to_string()),
            REQUEST_DURATION_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
