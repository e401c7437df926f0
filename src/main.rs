use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use edgegrid_proxy::logger;
use edgegrid_proxy::{Cli, Config, EdgeGridSigner, ProxyServer, ProxyService, ReqwestUpstream};

#[tokio::main]
async fn main() -> ExitCode {
    // --help/--version exit 0 and usage errors exit 2 inside clap
    let cli = Cli::parse();

    dotenv::dotenv().ok(); // Load .env file if present
    logger::init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting EdgeGrid proxy {}", edgegrid_proxy::VERSION);

    let config = Config::from_cli(&cli).context("failed to load an EdgeGrid configuration")?;

    let upstream = ReqwestUpstream::new(&config)?;
    let service = ProxyService::new(
        &config,
        Arc::new(EdgeGridSigner::new()),
        Arc::new(upstream),
    );

    let server = ProxyServer::bind(&config.listen, service)
        .await
        .context("failed to start listener")?;

    server.serve_with_shutdown(shutdown_signal()).await;
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
