// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tillprint — operator CLI for the LAN receipt/kitchen print daemon.
//
// Entry point. Initialises logging, resolves the data directory, and runs a
// single command against the print service.

mod data_dir;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tillprint_core::{ClientConfig, PrintError, PrintJob, TillprintError};
use tillprint_print::transport::TransportError;
use tillprint_print::{ConfigStore, JsonFileStore, PrintOptions, PrintService};

/// Tillprint - point-of-sale client for the LAN print daemon
#[derive(Parser, Debug)]
#[command(name = "tillprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the saved print server address
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Client tunables (JSON); defaults apply when absent
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save the print server address (blank to revert to the default)
    Configure {
        /// IP, hostname, or URL of the print daemon
        address: String,
    },
    /// Forget the saved address and use the default
    Reset,
    /// Show the address in use and the client tunables
    Show,
    /// Probe the print daemon once
    Health,
    /// Send a file to the print daemon as a job
    Print {
        /// Payload to send, forwarded untouched
        file: PathBuf,

        /// Content type of the payload
        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Attempt delivery even if the daemon was just seen offline
        #[arg(long)]
        force: bool,
    },
    /// Poll the print daemon and log reachability changes until Ctrl-C
    Watch,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Tillprint(#[from] TillprintError),

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot read {path}: {source}")]
    ReadJob {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("data directory unavailable: {0}")]
    DataDir(std::io::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let dir = data_dir::data_dir(cli.data_dir).map_err(AppError::DataDir)?;
    let store = ConfigStore::new(Arc::new(JsonFileStore::in_dir(&dir)));
    let service = PrintService::over_http(store.clone(), config.clone())?;

    match cli.command {
        Commands::Configure { address } => {
            let endpoint = service.configure(&address)?;
            println!("Print server: {endpoint}");
        }
        Commands::Reset => {
            let endpoint = service.reset()?;
            println!("Print server reset to default: {endpoint}");
        }
        Commands::Show => {
            let source = if store.is_customised() { "saved" } else { "default" };
            println!("Print server: {} ({source})", service.endpoint());
            println!("{}", serde_json::to_string_pretty(&config).map_err(TillprintError::from)?);
        }
        Commands::Health => {
            service.monitor().poll_once().await;
            let checked = service
                .monitor()
                .board()
                .snapshot()
                .map(|s| s.observed_at.to_rfc3339())
                .unwrap_or_default();
            println!("{}: {} (checked {checked})", service.endpoint(), service.get_status());
        }
        Commands::Print {
            file,
            content_type,
            force,
        } => {
            let payload = std::fs::read(&file).map_err(|source| AppError::ReadJob {
                path: file.clone(),
                source,
            })?;
            let job = PrintJob::new(payload, content_type);
            let options = PrintOptions { force_live: force };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let ack = service.print_with(&job, options, &cancel).await?;
            println!(
                "Job {} accepted (HTTP {}, {} attempt(s))",
                ack.job_id, ack.status, ack.attempts
            );
            if let Some(body) = ack.body {
                println!("{body}");
            }
        }
        Commands::Watch => {
            let cancel = CancellationToken::new();
            let handle = service.monitor().start(cancel.clone());
            tracing::info!(address = %service.endpoint(), "watching print server, Ctrl-C to stop");

            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C, stopping");
            }
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "monitor task ended abnormally");
            }
        }
    }

    Ok(())
}
