//! AceBridge Daemon - Sovol Ace printer to MTConnect SHDR bridge
//!
//! Polls the printer's Moonraker API once per period and streams the
//! translated observations to MTConnect agents.

use acebridge_common::ObservationSet;
use acebridged::adapter::Adapter;
use acebridged::config::Config;
use acebridged::poller::Poller;
use acebridged::printer_client::PrinterClient;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "acebridged")]
#[command(about = "Bridge Sovol Ace printer telemetry to MTConnect agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: /etc/acebridge/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Printer host name or IP address
    #[arg(long)]
    printer_host: Option<String>,

    /// Printer Moonraker API port
    #[arg(long)]
    printer_port: Option<u16>,

    /// Address the SHDR adapter listens on
    #[arg(long)]
    bind_host: Option<String>,

    /// Port the SHDR adapter listens on
    #[arg(long)]
    bind_port: Option<u16>,

    /// Polling period in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_path(path)?,
            None => Config::load(),
        };

        if let Some(host) = &self.printer_host {
            config.printer.host = host.clone();
        }
        if let Some(port) = self.printer_port {
            config.printer.port = port;
        }
        if let Some(host) = &self.bind_host {
            config.adapter.host = host.clone();
        }
        if let Some(port) = self.bind_port {
            config.adapter.port = port;
        }
        if let Some(interval) = self.interval_ms {
            config.poll.interval_ms = interval;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    info!("AceBridge Daemon v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Initializing adapter for printer {}", config.printer.host);

    let observations = ObservationSet::standard();

    // Bind failure is fatal
    let adapter = Adapter::bind(
        &config.adapter.bind_addr(),
        &observations,
        config.adapter.heartbeat(),
    )
    .await
    .context("SHDR adapter could not start")?;
    let transport = adapter.handle();
    let _adapter_task = adapter.start();

    let client = PrinterClient::new(
        &config.printer.host,
        config.printer.port,
        config.printer.timeout(),
    )?;
    info!("Polling {}", client.url());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut poller = Poller::new(client, transport, observations, config.poll.interval());
    let poll_task = tokio::spawn(async move {
        poller.run(shutdown_rx).await;
    });

    wait_for_signal().await?;
    info!("Shutting down gracefully");
    let _ = shutdown_tx.send(true);
    poll_task.await.context("Polling task panicked")?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl-C")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")
}
