//! Daemon loop
//!
//! Runs the stages back to back on a fixed interval. A stage failure is logged
//! and recorded in the cycle report; later stages still run and the loop never
//! exits on a routine error.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::sleep;

use keepsake_core::{AppError, LogLevel};

use crate::archiver::{archive_eligible_units, ArchiveOutcome};
use crate::context::DaemonContext;
use crate::db_backup::backup_database;
use crate::pruner::{prune, PruneReport};
use crate::replication::replicate_archives;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DbBackup,
    Archive,
    Replicate,
    Prune,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DbBackup => "db_backup",
            Stage::Archive => "archive",
            Stage::Replicate => "replicate",
            Stage::Prune => "prune",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageError {
    pub stage: Stage,
    /// `AppError::error_code` of the root failure, if it was one.
    pub code: Option<&'static str>,
    /// Whether the next cycle can be expected to get past this stage.
    pub recoverable: bool,
    pub message: String,
}

/// Outcome of one cycle, stage by stage.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub db_backup: Option<PathBuf>,
    pub archive: Option<ArchiveOutcome>,
    pub replicated: bool,
    pub prune: Option<PruneReport>,
    pub errors: Vec<StageError>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn failed(&self, stage: Stage) -> bool {
        self.errors.iter().any(|e| e.stage == stage)
    }

    fn record(&mut self, stage: Stage, err: anyhow::Error) {
        let message = format!("{:#}", err);
        let app_error = err.chain().find_map(|e| e.downcast_ref::<AppError>());
        let code = app_error.map(AppError::error_code);
        let recoverable = app_error.map_or(true, AppError::is_recoverable);

        match app_error.map_or(LogLevel::Error, AppError::log_level) {
            LogLevel::Warn => {
                tracing::warn!(stage = %stage, code = ?code, error = %message, "Stage failed")
            }
            LogLevel::Error => tracing::error!(
                stage = %stage,
                code = ?code,
                recoverable = recoverable,
                error = %message,
                "Stage failed"
            ),
        }

        self.errors.push(StageError {
            stage,
            code,
            recoverable,
            message,
        });
    }
}

pub struct Daemon {
    ctx: DaemonContext,
}

impl Daemon {
    pub fn new(ctx: DaemonContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DaemonContext {
        &self.ctx
    }

    /// Run every stage once, in order, as of `now`.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        tracing::info!("Starting backup cycle");

        match backup_database(&self.ctx, now).await {
            Ok(path) => report.db_backup = path,
            Err(e) => report.record(Stage::DbBackup, e),
        }

        match archive_eligible_units(&self.ctx, now).await {
            Ok(outcome) => report.archive = Some(outcome),
            Err(e) => report.record(Stage::Archive, e),
        }

        match replicate_archives(&self.ctx, now).await {
            Ok(()) => report.replicated = true,
            Err(e) => report.record(Stage::Replicate, e),
        }

        match prune(&self.ctx, self.ctx.config.verify_remote).await {
            Ok(prune_report) => report.prune = Some(prune_report),
            Err(e) => report.record(Stage::Prune, e),
        }

        tracing::info!(
            errors = report.errors.len(),
            replicated = report.replicated,
            "Backup cycle finished"
        );
        report
    }

    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(Utc::now()).await
    }

    /// Run cycles until a shutdown message arrives.
    ///
    /// Shutdown is only observed between cycles; a running cycle always
    /// completes. A message sent mid-cycle stops the loop right after it.
    pub async fn run_forever(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        let interval = self.ctx.config.cycle_interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            upload_dir = %self.ctx.config.upload_dir.display(),
            archive_dir = %self.ctx.config.archive_dir.display(),
            "Archive daemon started"
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Archive daemon shutting down");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        tracing::info!("Archive daemon stopped");
    }
}
