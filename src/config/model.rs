use serde::Deserialize;

/// Settings for the portbox service, as read from the YAML config file.
/// Every field is optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to.
    pub host: String,

    /// Port the HTTP listener binds to.
    pub port: u16,

    /// Connect timeout used when a request does not specify one.
    pub default_timeout_ms: u64,

    /// Largest `ports` array accepted by the multi-port check.
    pub max_ports: usize,

    /// Largest `endPort - startPort` accepted by the range check.
    pub max_port_range: u16,

    /// Optional metrics push target.
    pub mimir: Option<MimirConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            host: default_host(),
            port: 3000,
            default_timeout_ms: 5000,
            max_ports: 50,
            max_port_range: 100,
            mimir: None,
        }
    }
}

/// Where probe results are pushed, if anywhere.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MimirConfig {
    /// The base URL of the Mimir instance (e.g. "http://localhost:9009").
    pub endpoint: String,

    /// Sent as the 'X-Scope-OrgID' header for multi-tenant setups.
    pub tenant_id: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
