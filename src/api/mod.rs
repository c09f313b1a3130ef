pub mod health;
pub mod response;
pub mod routes;
pub mod server;
pub mod validation;

use std::time::{Duration, Instant};

use crate::config::app_config::AppConfig;
use crate::mimir::{self, client::MimirClient};
use crate::probe::prelude::*;

/// Everything a request handler needs, shared by all connections.
#[derive(Debug, Clone)]
pub struct AppState {
    pub prober: Prober,
    pub max_ports: usize,
    pub max_port_range: u16,
    pub mimir: Option<MimirClient>,
    started_at: Instant,
}

impl AppState {
    pub fn new(prober: Prober, max_ports: usize, max_port_range: u16, mimir: Option<MimirClient>) -> Self {
        AppState {
            prober,
            max_ports,
            max_port_range,
            mimir,
            started_at: Instant::now(),
        }
    }

    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let mimir = match &config.mimir {
            Some(m) => Some(MimirClient::new(&m.endpoint, m.tenant_id.as_deref())?),
            None => None,
        };

        Ok(AppState::new(
            Prober::new(config.default_timeout),
            config.max_ports,
            config.max_port_range,
            mimir,
        ))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Pushes `results` to Mimir in the background, if an endpoint is configured.
    pub fn export(&self, results: &[ProbeResult]) {
        let Some(client) = self.mimir.clone() else {
            return;
        };
        if results.is_empty() {
            return;
        }

        let results = results.to_vec();
        tokio::spawn(async move {
            mimir::push_results(&client, &results).await;
        });
    }
}
