//! Keepsake daemon: archives guest uploads, replicates them offsite and keeps
//! local disk usage under budget.
//!
//! Configuration comes from the environment (and `.env`); see `DaemonConfig`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use keepsake_core::DaemonConfig;
use keepsake_infra::archive::extract_archive;
use keepsake_infra::telemetry::{init_telemetry, shutdown_telemetry};
use keepsake_worker::{ensure_directories, purge_all, BackupStatus, Daemon, DaemonContext};

#[derive(Parser)]
#[command(name = "keepsake", about = "Event photo archive and retention daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run backup cycles until interrupted
    Run,
    /// Run a single backup cycle and exit
    Once,
    /// Show the last backup time, disk usage and archive counts
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all uploads, thumbnails, archives and daemon state
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
    /// Extract an archive into a directory
    Restore {
        /// Path to a batch_*.zip archive
        archive: PathBuf,
        /// Destination directory
        dest: PathBuf,
    },
}

/// Resolves once Ctrl+C or SIGTERM arrives, then tells the loop to stop.
async fn forward_shutdown_signal(tx: mpsc::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Finishing current cycle before shutdown...");
    let _ = tx.send(()).await;
}

fn load_config() -> anyhow::Result<DaemonConfig> {
    let config = DaemonConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;

    // Only the daemon modes write to the log file.
    let log_file = match cli.command {
        Commands::Run | Commands::Once => config.log_file.clone(),
        _ => None,
    };
    ensure_directories(&config)?;
    init_telemetry(log_file.as_deref())?;

    match cli.command {
        Commands::Run => {
            tracing::info!(
                environment = %config.environment,
                budget_gb = config.max_local_storage_gb,
                "Starting keepsake"
            );
            let daemon = Daemon::new(DaemonContext::from_config(config)?);
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(forward_shutdown_signal(tx));
            daemon.run_forever(rx).await;
        }
        Commands::Once => {
            let daemon = Daemon::new(DaemonContext::from_config(config)?);
            let report = daemon.run_once().await;
            if !report.is_clean() {
                for error in &report.errors {
                    eprintln!("{}: {}", error.stage, error.message);
                }
                shutdown_telemetry().await;
                bail!("{} stage(s) failed", report.errors.len());
            }
        }
        Commands::Status { json } => {
            let ctx = DaemonContext::from_config(config)?;
            let status = BackupStatus::collect(&ctx).await?;
            if json {
                let out =
                    serde_json::to_string_pretty(&status).context("Serialize status")?;
                println!("{}", out);
            } else {
                println!("{}", status);
            }
        }
        Commands::Purge { yes } => {
            if !yes {
                bail!("Refusing to purge without --yes");
            }
            let report = purge_all(&config)?;
            println!("Removed {} entries", report.entries_removed);
        }
        Commands::Restore { archive, dest } => {
            let extracted = tokio::task::spawn_blocking(move || extract_archive(&archive, &dest))
                .await
                .context("Restore task panicked")??;
            println!("Extracted {} files", extracted);
        }
    }

    shutdown_telemetry().await;
    Ok(())
}
