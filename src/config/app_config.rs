use std::env;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::probe::host_port;

use super::model::{MimirConfig, ServiceConfig};

const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Runtime configuration of the service, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub default_timeout: Duration,
    pub max_ports: usize,
    pub max_port_range: u16,
    pub mimir: Option<MimirConfig>,
}

impl AppConfig {
    pub fn bind_address(&self) -> String {
        host_port(&self.bind_host, self.bind_port)
    }
}

/// Load the application configuration from a YAML file and environment variables.
///
/// The file named by `CONFIG_FILE` (default `config.yml`) provides the base
/// settings; a missing default file is not an error. `HOST`, `PORT`,
/// `DEFAULT_TIMEOUT_MS`, `MAX_PORTS`, `MAX_PORT_RANGE`, `MIMIR_ENDPOINT` and
/// `MIMIR_TENANT_ID` override whatever the file says.
pub fn load_config() -> Result<AppConfig> {
    load_config_with(|name| env::var(name).ok())
}

/// Same as [`load_config`], with variables looked up through `lookup`.
pub fn load_config_with<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    resolve(lookup, Path::new(DEFAULT_CONFIG_FILE))
}

/// Reads `CONFIG_FILE`, or `default_file` when it is unset, then applies the
/// environment overrides.
fn resolve<F>(lookup: F, default_file: &Path) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let mut service = match var("CONFIG_FILE") {
        Some(path) => read_config_file(Path::new(&path))?,
        None => match read_config_file(default_file) {
            Err(AppError::ConfigRead { source, .. }) if source.kind() == ErrorKind::NotFound => {
                ServiceConfig::default()
            }
            other => other?,
        },
    };

    if let Some(host) = var("HOST") {
        service.host = host.trim().to_string();
    }
    if let Some(port) = var("PORT") {
        service.port = parse_setting("PORT", &port)?;
    }
    if let Some(timeout) = var("DEFAULT_TIMEOUT_MS") {
        service.default_timeout_ms = parse_setting("DEFAULT_TIMEOUT_MS", &timeout)?;
    }
    if let Some(max_ports) = var("MAX_PORTS") {
        service.max_ports = parse_setting("MAX_PORTS", &max_ports)?;
    }
    if let Some(max_range) = var("MAX_PORT_RANGE") {
        service.max_port_range = parse_setting("MAX_PORT_RANGE", &max_range)?;
    }
    if let Some(endpoint) = var("MIMIR_ENDPOINT") {
        let tenant_id = service.mimir.take().and_then(|m| m.tenant_id);
        service.mimir = Some(MimirConfig {
            endpoint: endpoint.trim().to_string(),
            tenant_id,
        });
    }
    if let (Some(tenant), Some(mimir)) = (var("MIMIR_TENANT_ID"), service.mimir.as_mut()) {
        mimir.tenant_id = Some(tenant.trim().to_string());
    }

    if service.default_timeout_ms == 0 {
        return Err(AppError::InvalidSetting {
            name: "DEFAULT_TIMEOUT_MS",
            value: "0".to_string(),
            reason: "timeout must be positive".to_string(),
        });
    }

    if let Some(mimir) = &service.mimir {
        log::info!("Using Mimir endpoint: {}", mimir.endpoint);
    }

    Ok(AppConfig {
        bind_host: service.host,
        bind_port: service.port,
        default_timeout: Duration::from_millis(service.default_timeout_ms),
        max_ports: service.max_ports,
        max_port_range: service.max_port_range,
        mimir: service.mimir,
    })
}

fn read_config_file(path: &Path) -> Result<ServiceConfig> {
    let config_str = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
        path: path.display().to_string(),
        source,
    })?;

    serde_yaml::from_str(&config_str).map_err(|source| AppError::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}

fn parse_setting<T>(name: &'static str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| AppError::InvalidSetting {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
