use chrono::{DateTime, Utc};
use client::prometheus::prompb;

use crate::probe::result::ProbeResult;

pub mod client;

const INSTANCE_LABEL: &str = "instance";
const JOB_LABEL: &str = "job";
const MODULE_LABEL: &str = "module";
const TARGET_LABEL: &str = "target";
const PROBE_SUCCESS_METRIC: &str = "probe_success";
const PROBE_DURATION_METRIC: &str = "probe_duration_seconds";

const BLACKBOX_JOB: &str = "portbox";
const TCP_MODULE: &str = "tcp_connect";

fn target_series(metric_name: &str, target: &str, value: f64, at: DateTime<Utc>) -> prompb::TimeSeries {
    let labels = [
        (INSTANCE_LABEL, target),
        (JOB_LABEL, BLACKBOX_JOB),
        (MODULE_LABEL, TCP_MODULE),
        (TARGET_LABEL, target),
    ];

    prompb::TimeSeries::gauge(metric_name, &labels, value, at)
}

/// Creates the TimeSeries metrics for one port check:
///    - `probe_success`: 1.0 when the port was reachable, 0.0 otherwise.
///    - `probe_duration_seconds`: time the connect attempt took (the timeout, if it timed out).
///
/// Both series are labelled with `host:port` as target and stamped with the
/// time the result was produced.
pub fn create_probe_metrics(probe_result: &ProbeResult) -> Vec<prompb::TimeSeries> {
    let target = probe_result.target();
    let at = probe_result.timestamp;
    let success = if probe_result.is_reachable { 1.0 } else { 0.0 };

    vec![
        target_series(PROBE_SUCCESS_METRIC, &target, success, at),
        target_series(PROBE_DURATION_METRIC, &target, probe_result.response_time_ms / 1000.0, at),
    ]
}

/// Pushes the metrics of a batch of results, logging rather than returning
/// any failure.
pub async fn push_results(client: &client::MimirClient, results: &[ProbeResult]) {
    let metrics: Vec<prompb::TimeSeries> = results.iter().flat_map(create_probe_metrics).collect();
    let count = metrics.len();

    match client.send(metrics).await {
        Ok(()) => log::debug!("Pushed {count} series to {}", client.endpoint()),
        Err(e) => log::warn!("Failed to send metrics to {}: {e}", client.endpoint()),
    }
}
