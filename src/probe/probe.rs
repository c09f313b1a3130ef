use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;

use super::prelude::*;
use super::report;

/// Timeout applied when neither the configuration nor the caller sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Entry point for port checks, carrying the configured default timeout.
///
/// Every operation takes an optional per-call timeout; `None` falls back to
/// the default this prober was built with.
#[derive(Debug, Clone, Copy)]
pub struct Prober {
    default_timeout: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Prober::new(DEFAULT_TIMEOUT)
    }
}

impl Prober {
    pub fn new(default_timeout: Duration) -> Self {
        Prober { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.default_timeout)
    }

    pub async fn probe(&self, host: &str, port: u16, timeout: Option<Duration>) -> ProbeResult {
        probe_port(host, port, self.timeout_or_default(timeout)).await
    }

    pub async fn probe_many(&self, host: &str, ports: &[u16], timeout: Option<Duration>) -> Vec<ProbeResult> {
        probe_ports(host, ports, self.timeout_or_default(timeout)).await
    }

    pub async fn probe_range(
        &self,
        host: &str,
        start_port: u16,
        end_port: u16,
        timeout: Option<Duration>,
    ) -> Vec<ProbeResult> {
        probe_range(host, start_port, end_port, self.timeout_or_default(timeout)).await
    }
}

/// Races `connect` against `connect_timeout`.
///
/// Whichever side loses is dropped, so a pending connect releases its socket
/// and a resolved connect disarms the timer.
async fn race<F, S>(connect: F, connect_timeout: Duration) -> ProbeOutcome
where
    F: Future<Output = io::Result<S>>,
{
    let start = Instant::now();

    match timeout(connect_timeout, connect).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            drop(stream);
            ProbeOutcome::Connected(elapsed)
        }
        Ok(Err(e)) => ProbeOutcome::Failed(start.elapsed(), report(&e)),
        Err(_) => ProbeOutcome::TimedOut,
    }
}

/// Checks a single port. Never fails: refused, unreachable, unresolvable and
/// timed-out attempts all come back as an unreachable result.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    check_with(host, port, timeout, TcpStream::connect((host, port))).await
}

async fn check_with<F, S>(host: &str, port: u16, timeout: Duration, connect: F) -> ProbeResult
where
    F: Future<Output = io::Result<S>>,
{
    let outcome = race(connect, timeout).await;

    match &outcome {
        ProbeOutcome::Connected(elapsed) => {
            log::debug!("{host}:{port} reachable in {:.2}ms", elapsed.as_secs_f64() * 1000.0)
        }
        ProbeOutcome::Failed(_, reason) => log::debug!("{host}:{port} unreachable: {reason}"),
        ProbeOutcome::TimedOut => log::debug!("{host}:{port} timed out after {timeout:?}"),
    }

    ProbeResult::from_outcome(host, port, outcome, timeout)
}

/// Checks all `ports` concurrently, one task per port.
///
/// The returned results are in the same order as `ports`, whatever order the
/// connects resolve in. Repeated ports are probed independently.
pub async fn probe_ports(host: &str, ports: &[u16], timeout: Duration) -> Vec<ProbeResult> {
    if ports.is_empty() {
        return Vec::new();
    }

    let started = Instant::now();
    let shared_host: Arc<str> = Arc::from(host);
    let mut handles = Vec::with_capacity(ports.len());

    for &port in ports {
        let host = Arc::clone(&shared_host);
        let handle = tokio::spawn(async move { probe_port(&host, port, timeout).await });
        handles.push((port, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (port, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Probe task for {host}:{port} did not complete: {e}");
                let outcome = ProbeOutcome::Failed(started.elapsed(), report(&e));
                ProbeResult::from_outcome(host, port, outcome, timeout)
            }
        };
        results.push(result);
    }

    results
}

/// Checks every port from `start_port` to `end_port`, both inclusive, in
/// ascending order. An inverted range yields no results.
pub async fn probe_range(host: &str, start_port: u16, end_port: u16, timeout: Duration) -> Vec<ProbeResult> {
    let ports: Vec<u16> = (start_port..=end_port).collect();
    probe_ports(host, &ports, timeout).await
}
