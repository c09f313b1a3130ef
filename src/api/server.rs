use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::AppState;
use super::routes::create_app;
use crate::config::app_config::AppConfig;
use crate::error::{AppError, Result};

/// How long in-flight connections get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Binds the configured address and serves the API until Ctrl+C or SIGTERM.
pub async fn run_server(config: &AppConfig, state: Arc<AppState>) -> Result<()> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr: addr.clone(), source })?;

    log::info!("Server running on {}", listener.local_addr()?);
    log::info!(
        "Default timeout {:?}, at most {} ports per request, ranges up to {} ports",
        state.prober.default_timeout(),
        state.max_ports,
        state.max_port_range
    );

    serve(listener, state, shutdown_signal()).await
}

/// Serves the API on `listener` until `shutdown` completes, then waits for
/// open connections to finish (up to a grace period).
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let signal = async move {
        shutdown.await;
        log::info!("Shutting down, no longer accepting connections");
        let _ = stopping_tx.send(());
    };

    let server = axum::serve(listener, create_app(state))
        .with_graceful_shutdown(signal)
        .into_future();

    let grace_expired = async {
        match stopping_rx.await {
            Ok(()) => tokio::time::sleep(SHUTDOWN_GRACE).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            result?;
            log::info!("All connections closed");
        }
        _ = grace_expired => {
            log::warn!("Timed out after {SHUTDOWN_GRACE:?} waiting for connections to close");
        }
    }

    Ok(())
}

/// Completes when Ctrl+C, or SIGTERM on Unix, is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                log::info!("Received SIGTERM");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
