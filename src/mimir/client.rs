pub mod prometheus {
    /// The subset of the Prometheus remote-write protobuf schema
    /// (`prometheus/prompb/remote.proto` and `types.proto`) that portbox sends.
    pub mod prompb {
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct WriteRequest {
            #[prost(message, repeated, tag = "1")]
            pub timeseries: Vec<TimeSeries>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct TimeSeries {
            #[prost(message, repeated, tag = "1")]
            pub labels: Vec<Label>,
            #[prost(message, repeated, tag = "2")]
            pub samples: Vec<Sample>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct Label {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub value: String,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct Sample {
            #[prost(double, tag = "1")]
            pub value: f64,
            #[prost(int64, tag = "2")]
            pub timestamp: i64,
        }
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use prometheus::prompb::{Label, Sample, TimeSeries, WriteRequest};
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue},
};
use snap::raw::Encoder;
use thiserror::Error;

const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Error, Debug)]
pub enum PushError {
    #[error("failed to encode write request: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("failed to compress write request: {0}")]
    Compress(#[from] snap::Error),

    #[error("invalid tenant id: {0}")]
    TenantHeader(#[from] InvalidHeaderValue),

    #[error("request to Mimir failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mimir rejected the push: {status} - {body}")]
    Rejected { status: StatusCode, body: String },
}

/// A remote-write client for one Mimir endpoint.
#[derive(Debug, Clone)]
pub struct MimirClient {
    client: Client,
    endpoint: String,
    tenant_id: Option<String>,
}

impl MimirClient {
    /// Builds a client for `endpoint` (e.g. "http://localhost:9009"), sending
    /// `tenant_id` as the org header when set.
    pub fn new(endpoint: &str, tenant_id: Option<&str>) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("portbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(MimirClient {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.map(str::to_string),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends Prometheus metrics to the Mimir remote write endpoint.
    pub async fn send(&self, metrics: Vec<TimeSeries>) -> Result<(), PushError> {
        if metrics.is_empty() {
            log::warn!("No metrics to send.");
            return Ok(());
        }

        let body = encode_write_request(metrics)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("snappy"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-protobuf"));
        headers.insert(
            "X-Prometheus-Remote-Write-Version",
            HeaderValue::from_static("0.1.0"),
        );
        if let Some(id) = &self.tenant_id {
            headers.insert("X-Scope-OrgID", HeaderValue::from_str(id)?);
        }

        let response = self
            .client
            .post(format!("{}/api/v1/push", self.endpoint))
            .headers(headers)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("Failed to push to Mimir: {} - {}", status, body);
            return Err(PushError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Protobuf-encodes the series as a `WriteRequest` and snappy-compresses it.
fn encode_write_request(metrics: Vec<TimeSeries>) -> Result<Vec<u8>, PushError> {
    let write_request = WriteRequest { timeseries: metrics };

    let mut buf = Vec::new();
    prost::Message::encode(&write_request, &mut buf)?;

    let mut encoder = Encoder::new();
    Ok(encoder.compress_vec(&buf)?)
}

impl TimeSeries {
    /// A series holding the single sample `value` at `at`.
    ///
    /// `metric_name` becomes the `__name__` label, and labels are sorted by
    /// name since remote-write receivers reject unsorted label sets.
    pub fn gauge(metric_name: &str, labels: &[(&str, &str)], value: f64, at: DateTime<Utc>) -> Self {
        let mut labels: Vec<Label> = std::iter::once((METRIC_NAME_LABEL, metric_name))
            .chain(labels.iter().copied())
            .map(|(name, value)| Label {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        TimeSeries {
            labels,
            samples: vec![Sample {
                value,
                timestamp: at.timestamp_millis(),
            }],
        }
    }
}
