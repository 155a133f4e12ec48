mod catalog;
mod config;
mod diff;
mod error;
mod hub;
mod log_capture;
mod parsers;
mod remote;
mod replay;
mod routes;
mod server;
mod state;

use clap::Parser;
use std::sync::Arc;
use tracing::info;

use config::{CliArgs, Config};
use log_capture::{LogLevel, LogSource};
use state::ScopeState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionscope=info,tower_http=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    info!("Starting sessionscope v{}", env!("CARGO_PKG_VERSION"));
    info!("Hub URL: {}", args.hub_url);
    info!("API URL: {}", args.api_url);

    let config = Config::from_args(args);
    let port = config.port;
    let state = Arc::new(ScopeState::new(config));

    state
        .logs
        .emit(
            LogSource::Backend,
            LogLevel::Info,
            format!("Backend starting on port {port}"),
        )
        .await;

    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
