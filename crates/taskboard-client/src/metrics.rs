//! Client request metrics
//!
//! - `taskboard_requests_total` (counter): labels `status`, `method`
//! - `taskboard_request_duration_seconds` (histogram): label `status`
//! - `taskboard_auth_retries_total` (counter): retries after a 401
//! - `taskboard_sessions_ended_total` (counter): label `reason`
//!
//! Without an installed recorder every call is a no-op.

/// Histogram buckets for request durations, 5ms to 60s.
pub const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Record a finished request. `status` is the HTTP status or an error class.
pub fn record_request(status: &str, method: &str, duration_secs: f64) {
    metrics::counter!("taskboard_requests_total", "status" => status.to_string(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("taskboard_request_duration_seconds", "status" => status.to_string())
        .record(duration_secs);
}

/// Record a retry triggered by a 401.
pub fn record_auth_retry() {
    metrics::counter!("taskboard_auth_retries_total").increment(1);
}

/// Record a session ended by the pipeline.
pub fn record_session_ended(reason: &str) {
    metrics::counter!("taskboard_sessions_ended_total", "reason" => reason.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("taskboard_request_duration_seconds".to_string()),
                REQUEST_DURATION_BUCKETS,
            )
            .unwrap()
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("200", "GET", 0.05);
        record_auth_retry();
        record_session_ended("unauthorized");
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("200", "GET", 0.042);
        record_request("transport_error", "POST", 1.5);

        let output = handle.render();
        assert!(output.contains("taskboard_requests_total"));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"transport_error\""));
        assert!(output.contains("taskboard_request_duration_seconds_bucket"));
        assert!(output.contains("le=\"60\""));
    }

    #[test]
    fn retry_and_session_counters_render() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_auth_retry();
        record_auth_retry();
        record_session_ended("refresh_failed");

        let output = handle.render();
        assert!(output.contains("taskboard_auth_retries_total 2"), "got:\n{output}");
        assert!(output.contains("reason=\"refresh_failed\""));
    }
}
