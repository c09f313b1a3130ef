use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Error text reported when a connect attempt does not resolve within its timeout.
pub const TIMEOUT_MESSAGE: &str = "Connection timeout";

/// How a single connect attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Connected(Duration),
    Failed(Duration, String),
    TimedOut,
}

/// The reachability of one (host, port) pair, as reported to API callers.
///
/// A result is either reachable with no error, or unreachable with an error
/// message. The response time is always populated; for a timeout it equals
/// the configured timeout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub host: String,
    pub port: u16,
    pub is_reachable: bool,

    /// Elapsed wall-clock time of the attempt, in milliseconds.
    #[serde(rename = "responseTime")]
    pub response_time_ms: f64,

    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Builds the result for `host:port` from the outcome of its connect attempt,
    /// stamped with the current time.
    pub fn from_outcome(host: &str, port: u16, outcome: ProbeOutcome, timeout: Duration) -> Self {
        let (is_reachable, elapsed, error_message) = match outcome {
            ProbeOutcome::Connected(elapsed) => (true, elapsed, None),
            ProbeOutcome::Failed(elapsed, reason) => (false, elapsed, Some(reason)),
            ProbeOutcome::TimedOut => (false, timeout, Some(TIMEOUT_MESSAGE.to_string())),
        };

        ProbeResult {
            host: host.to_string(),
            port,
            is_reachable,
            response_time_ms: as_millis_f64(elapsed),
            error_message,
            timestamp: Utc::now(),
        }
    }

    /// `host:port`, used as the target label when exporting metrics.
    pub fn target(&self) -> String {
        super::host_port(&self.host, self.port)
    }
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_outcome_has_no_error() {
        let result = ProbeResult::from_outcome(
            "localhost",
            8080,
            ProbeOutcome::Connected(Duration::from_millis(12)),
            Duration::from_secs(5),
        );

        assert!(result.is_reachable);
        assert!(result.error_message.is_none());
        assert_eq!(result.response_time_ms, 12.0);
    }

    #[test]
    fn test_failed_outcome_keeps_reason_and_elapsed() {
        let result = ProbeResult::from_outcome(
            "localhost",
            9999,
            ProbeOutcome::Failed(Duration::from_millis(3), "Connection refused".to_string()),
            Duration::from_secs(5),
        );

        assert!(!result.is_reachable);
        assert_eq!(result.error_message.as_deref(), Some("Connection refused"));
        assert_eq!(result.response_time_ms, 3.0);
    }

    #[test]
    fn test_timeout_reports_configured_timeout() {
        let result = ProbeResult::from_outcome(
            "192.0.2.1",
            80,
            ProbeOutcome::TimedOut,
            Duration::from_millis(500),
        );

        assert!(!result.is_reachable);
        assert_eq!(result.error_message.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(result.response_time_ms, 500.0);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_missing_error() {
        let result = ProbeResult::from_outcome(
            "example.com",
            443,
            ProbeOutcome::Connected(Duration::from_millis(20)),
            Duration::from_secs(5),
        );
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["host"], "example.com");
        assert_eq!(json["port"], 443);
        assert_eq!(json["isReachable"], true);
        assert_eq!(json["responseTime"], 20.0);
        assert!(json.get("error").is_none());

        let ts = json["timestamp"].as_str().expect("timestamp is a string");
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_target_brackets_ipv6_hosts() {
        let v4 = ProbeResult::from_outcome("10.0.0.1", 22, ProbeOutcome::TimedOut, Duration::from_secs(1));
        let v6 = ProbeResult::from_outcome("::1", 22, ProbeOutcome::TimedOut, Duration::from_secs(1));

        assert_eq!(v4.target(), "10.0.0.1:22");
        assert_eq!(v6.target(), "[::1]:22");
    }
}
