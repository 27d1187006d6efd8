//! End-to-end update run: orchestrate, audit, write the log file

use std::path::PathBuf;

use crate::config::UpdateConfig;
use crate::reconcile::{RunReport, SampleDataUpdate};
use crate::traits::*;
use crate::types::*;
use crate::utils::progress::ProgressLog;

/// Performs one complete sample data update
pub struct UpdateRunner<S: UpdateStorage> {
    storage: S,
    config: UpdateConfig,
    log_path: PathBuf,
}

impl<S: UpdateStorage + Clone> UpdateRunner<S> {
    /// Create a runner that writes its log to `config.output_file_name`
    pub fn new(storage: S, config: UpdateConfig) -> Self {
        let log_path = PathBuf::from(&config.output_file_name);
        Self {
            storage,
            config,
            log_path,
        }
    }

    /// Write the log file somewhere other than the configured name
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Run the update, record the audit row and write the log file
    ///
    /// Reconciliation and audit failures end up in the progress log and
    /// the report; only a failure to write the log file is returned.
    pub async fn run(&self, progress: &ProgressLog) -> ReconcileResult<RunReport> {
        let started = chrono::Local::now().naive_local();
        tracing::info!("sample data update started");

        let update = SampleDataUpdate::with_codes(self.storage.clone(), self.config.lookup.clone());
        let report = update.run(progress).await;

        let settings = &self.config.update_log;
        let audit = UpdateLog::new(&settings.name, &settings.update_type, &settings.notes);
        if let Err(err) = self.storage.insert_update_log(&audit).await {
            tracing::error!(error = %err, "failed to record update log");
            progress.post(&format!("ERROR: {}", err));
        }

        let ended = chrono::Local::now().naive_local();
        progress.write_log_file(&self.log_path, started, ended)?;
        tracing::info!(succeeded = report.succeeded(), "sample data update finished");

        Ok(report)
    }
}
