//! Progress messages and the run log file

use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::traits::*;
use crate::types::*;

const SEPARATOR: &str = "================================";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collects progress messages in order and mirrors them to `tracing`
#[derive(Debug, Clone, Default)]
pub struct ProgressLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message posted so far
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Render the log file contents
    pub fn render(
        &self,
        started: NaiveDateTime,
        ended: NaiveDateTime,
        generated: NaiveDateTime,
    ) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "This log file generated at: {}\n \n",
            generated.format(TIMESTAMP_FORMAT)
        ));
        out.push_str(&format!(
            "Updater began: {}\n \n",
            started.format(TIMESTAMP_FORMAT)
        ));
        out.push_str(SEPARATOR);
        out.push_str("\n \n");
        for message in self.messages() {
            out.push_str(&message);
            out.push('\n');
        }
        out.push_str(" \n");
        out.push_str(SEPARATOR);
        out.push_str("\n \n");
        out.push_str(&format!("Updater ended: {}\n", ended.format(TIMESTAMP_FORMAT)));
        out
    }

    /// Write the log file, replacing any previous file at `path`
    pub fn write_log_file(
        &self,
        path: &Path,
        started: NaiveDateTime,
        ended: NaiveDateTime,
    ) -> ReconcileResult<()> {
        let generated = chrono::Local::now().naive_local();
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(self.render(started, ended, generated).as_bytes())?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "wrote update log file");
        Ok(())
    }
}

impl ProgressSink for ProgressLog {
    fn post(&self, message: &str) {
        if message.starts_with("ERROR:") {
            tracing::error!("{}", message);
        } else if message.starts_with("POPULATION RECORD NOT FOUND") {
            tracing::warn!("{}", message);
        } else {
            tracing::info!("{}", message);
        }

        match self.messages.lock() {
            Ok(mut messages) => messages.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}
