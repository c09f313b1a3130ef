use std::sync::Arc;

pub mod api;
use api::{AppState, server::run_server};
pub mod config;
use config::app_config::load_config;
pub mod error;
pub mod mimir;
pub mod probe;

#[tokio::main]
async fn main() {
    // a missing .env file is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let config = load_config()?;
    let state = Arc::new(AppState::from_config(&config)?);

    run_server(&config, state).await?;

    log::info!("Server shutdown complete.");
    Ok(())
}
