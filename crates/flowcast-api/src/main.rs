//! Flowcast CLI and server entry point.
//!
//! Binary name: `flowcast`
//!
//! Parses CLI arguments, loads configuration, then either prints it or
//! starts the HTTP/WebSocket server together with the flow driver.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use flowcast_infra::config::load_config;
use flowcast_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};
use flowcast_types::config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowcast", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let mut config = load_config(&cli.config).await;

    let result = match cli.command {
        Commands::Serve { host, port, seed } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate()?;
            serve(config).await
        }

        Commands::Config { json } => {
            config.validate()?;
            cli::config::show_config(&config, json)
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let state = AppState::new(Arc::new(config));
    let cancel = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let driver = state.start_driver(cancel.clone());

    tracing::info!(
        %addr,
        history_capacity = state.store.capacity(),
        threshold = state.config.broadcast_threshold,
        "Flowcast listening"
    );
    println!("  Flowcast listening on http://{addr}");
    println!("  Press Ctrl+C to stop");

    let router = http::router::build_router(state.clone());
    let hub = Arc::clone(&state.hub);
    let stop = cancel.clone();

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested");
            // Stop producing and close every live socket so the server can drain.
            stop.cancel();
            hub.shutdown();
        })
        .await?;

    let ticks = driver.shutdown().await?;
    tracing::info!(ticks, stored = state.store.len(), "Server stopped");
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
