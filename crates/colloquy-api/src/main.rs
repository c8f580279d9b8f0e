//! Colloquy REST API entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, loads configuration, initializes the database and
//! services, then dispatches to the requested command.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ServeArgs};
use colloquy_observe::tracing_setup::{init_tracing, shutdown_tracing};
use state::AppState;

/// How long in-flight requests may keep running after a shutdown signal
/// before their contexts are cancelled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "colloquy", &mut std::io::stdout());
        return Ok(());
    }

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let otel = matches!(&cli.command, Commands::Serve(args) if args.otel);
    init_tracing(otel, filter).map_err(|e| anyhow::anyhow!(e))?;

    let result = match cli.command {
        Commands::Serve(args) => serve(args, cli.quiet).await,
        Commands::CheckConfig(args) => {
            let config = args.load().await?;
            cli::config::check_config(&config, cli.json)
        }
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}

async fn serve(args: ServeArgs, quiet: bool) -> anyhow::Result<()> {
    let config = args.load().await?;

    // Signing key and database are set up once; both stay immutable afterwards.
    let state = AppState::init(&config).await?;
    let db_pool = state.db_pool.clone();
    let shutdown = state.shutdown.clone();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if !quiet {
        println!(
            "  {} Colloquy API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }
    tracing::info!(%addr, "server started");

    let router = http::router::build_router(state, &config.cors);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "shutdown requested, draining requests"
            );
            tokio::spawn(async move {
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                shutdown.cancel();
            });
        })
        .await?;

    db_pool.close().await;
    tracing::info!("server stopped");
    if !quiet {
        println!("\n  Server stopped.");
    }
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
