// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhub: home-network printer server
//
// Entry point. Initialises logging, loads configuration, builds the backend
// services and serves the HTTP API until SIGINT / SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use printhub_app::services::advertise::LanAdvertisement;
use printhub_app::{AppServices, build_router};
use printhub_core::config::AppConfig;
use printhub_core::error::{PrinthubError, Result};

/// Print, scan and maintain a LAN printer over HTTP.
#[derive(Debug, Parser)]
#[command(name = "printhub", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "PRINTHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000 (overrides the configuration).
    #[arg(short, long)]
    listen: Option<String>,

    /// Advertise the web UI over mDNS-SD.
    #[arg(long)]
    mdns: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("printhub starting");

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "printhub failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if cli.mdns {
        config.advertise_mdns = true;
    }

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| PrinthubError::Config(format!("listen address '{}': {e}", config.listen_addr)))?;
    let advertise = config.advertise_mdns;
    let instance = format!("printhub ({})", config.printer_name);

    let services = AppServices::init(config)?;
    let listener = TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();
    info!(%addr, "printhub listening");

    let advertisement = if advertise {
        LanAdvertisement::register(&instance, port)
    } else {
        None
    };

    axum::serve(listener, build_router(services))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    if let Some(advertisement) = advertisement {
        advertisement.shutdown();
    }
    info!("printhub stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("could not register signal handlers, falling back to ctrl-c");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "ctrl-c handler failed");
                    std::future::pending::<()>().await;
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    }
    info!("shutdown signal received");
}
