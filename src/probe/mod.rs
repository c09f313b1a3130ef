pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::probe::{DEFAULT_TIMEOUT, Prober, probe_port, probe_ports, probe_range};
    pub use super::result::{ProbeOutcome, ProbeResult, TIMEOUT_MESSAGE};
}

use std::fmt::Write;

/// `host:port`, with IPv6 literals bracketed so the port stays unambiguous.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Flattens an error and its chain of sources into a single line.
fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
