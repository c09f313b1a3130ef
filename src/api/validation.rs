//! Request bodies of the check endpoints and the rules they must satisfy
//! before any probe is attempted.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

const MIN_PORT: i64 = 1;
const MAX_PORT: i64 = 65535;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Host and port are required")]
    MissingPortFields,

    #[error("Host and ports array are required")]
    MissingPortsFields,

    #[error("Host, startPort, and endPort are required")]
    MissingRangeFields,

    #[error("Port must be a number between 1 and 65535")]
    PortOutOfRange,

    #[error("Maximum {max} ports allowed per request")]
    TooManyPorts { max: usize },

    #[error("startPort must not be greater than endPort")]
    InvertedRange,

    #[error("Port range cannot exceed {max} ports")]
    RangeTooLarge { max: u16 },

    #[error("Timeout must be a positive number of milliseconds")]
    InvalidTimeout,

    #[error("Invalid JSON body")]
    InvalidBody(String),
}

impl ValidationError {
    /// A well-formed request body to show alongside "missing field" errors.
    pub fn example(&self) -> Option<serde_json::Value> {
        match self {
            ValidationError::MissingPortFields => Some(json!({ "host": "google.com", "port": 80 })),
            ValidationError::MissingPortsFields => {
                Some(json!({ "host": "google.com", "ports": [80, 443, 8080] }))
            }
            ValidationError::MissingRangeFields => {
                Some(json!({ "host": "google.com", "startPort": 80, "endPort": 85 }))
            }
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidBody(detail) => Some(detail),
            _ => None,
        }
    }
}

/// A numeric field as sent. Values of the wrong JSON type are kept so they
/// fail validation with the field's own message instead of as bad syntax.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IntField {
    Int(i64),
    Other(serde_json::Value),
}

/// The `ports` field: an array, or whatever else was sent in its place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PortList {
    List(Vec<IntField>),
    Other(serde_json::Value),
}

/// Body of `POST /api/check-port`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPortRequest {
    pub host: Option<String>,
    pub port: Option<IntField>,
    pub timeout: Option<IntField>,
}

/// Body of `POST /api/check-ports`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPortsRequest {
    pub host: Option<String>,
    pub ports: Option<PortList>,
    pub timeout: Option<IntField>,
}

/// Body of `POST /api/check-port-range`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPortRangeRequest {
    pub host: Option<String>,
    pub start_port: Option<IntField>,
    pub end_port: Option<IntField>,
    pub timeout: Option<IntField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortCheck {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortsCheck {
    pub host: String,
    pub ports: Vec<u16>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeCheck {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    pub timeout: Option<Duration>,
}

/// Parses a JSON request body. An empty body counts as `{}`, so it fails on
/// the missing fields rather than on syntax.
pub fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ValidationError::InvalidBody(e.to_string()))
}

fn non_empty_host(host: Option<String>) -> Option<String> {
    host.filter(|h| !h.trim().is_empty())
}

// Port 0 is reported as out of range, not as missing.
fn to_port(port: IntField) -> Result<u16, ValidationError> {
    match port {
        IntField::Int(port) if (MIN_PORT..=MAX_PORT).contains(&port) => Ok(port as u16),
        _ => Err(ValidationError::PortOutOfRange),
    }
}

fn to_timeout(timeout: Option<IntField>) -> Result<Option<Duration>, ValidationError> {
    match timeout {
        None => Ok(None),
        Some(IntField::Int(ms)) if ms > 0 => Ok(Some(Duration::from_millis(ms as u64))),
        Some(_) => Err(ValidationError::InvalidTimeout),
    }
}

impl CheckPortRequest {
    pub fn validate(self) -> Result<PortCheck, ValidationError> {
        let (Some(host), Some(port)) = (non_empty_host(self.host), self.port) else {
            return Err(ValidationError::MissingPortFields);
        };

        Ok(PortCheck {
            host,
            port: to_port(port)?,
            timeout: to_timeout(self.timeout)?,
        })
    }
}

impl CheckPortsRequest {
    pub fn validate(self, max_ports: usize) -> Result<PortsCheck, ValidationError> {
        let (Some(host), Some(PortList::List(ports))) = (non_empty_host(self.host), self.ports) else {
            return Err(ValidationError::MissingPortsFields);
        };

        if ports.len() > max_ports {
            return Err(ValidationError::TooManyPorts { max: max_ports });
        }

        let ports = ports.into_iter().map(to_port).collect::<Result<Vec<u16>, _>>()?;

        Ok(PortsCheck {
            host,
            ports,
            timeout: to_timeout(self.timeout)?,
        })
    }
}

impl CheckPortRangeRequest {
    pub fn validate(self, max_port_range: u16) -> Result<RangeCheck, ValidationError> {
        let (Some(host), Some(start_port), Some(end_port)) =
            (non_empty_host(self.host), self.start_port, self.end_port)
        else {
            return Err(ValidationError::MissingRangeFields);
        };

        let start_port = to_port(start_port)?;
        let end_port = to_port(end_port)?;

        if start_port > end_port {
            return Err(ValidationError::InvertedRange);
        }
        if end_port - start_port > max_port_range {
            return Err(ValidationError::RangeTooLarge { max: max_port_range });
        }

        Ok(RangeCheck {
            host,
            start_port,
            end_port,
            timeout: to_timeout(self.timeout)?,
        })
    }
}
