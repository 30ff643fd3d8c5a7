//! # Drop Reports
//!
//! Sinks for successful drops. The engine calls [`Report::record_drop`] for
//! every success; the caller calls [`Report::finish`] once the ledger and the
//! store have been persisted, so a failed run never reports drops that were
//! not kept.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::debug;

use crate::error::{LimiterError, LimiterResult};
use crate::table::DropSpec;

/// Receives every successful drop of a run.
pub trait Report {
    /// Records one drop at its simulated instant.
    fn record_drop(&mut self, spec: &DropSpec, timestamp: i64);

    /// Flushes whatever was recorded.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` if the sink cannot be written.
    fn finish(&mut self) -> LimiterResult<()>;
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReport;

impl Report for NullReport {
    fn record_drop(&mut self, _spec: &DropSpec, _timestamp: i64) {}

    fn finish(&mut self) -> LimiterResult<()> {
        Ok(())
    }
}

const CSV_HEADER: [&str; 4] = ["DateTime", "Timestamp", "Item", "ItemIndex"];

/// Appends one quoted CSV row per drop.
#[derive(Clone, Debug)]
pub struct CsvReport {
    path: PathBuf,
    rows: Vec<String>,
}

impl CsvReport {
    /// Creates a report appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    /// The CSV path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows recorded but not yet written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rows.len()
    }

    fn row<S: AsRef<str>>(values: &[S]) -> String {
        let mut row = values
            .iter()
            .map(|v| format!("\"{}\"", v.as_ref().replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(",");
        row.push('\n');
        row
    }
}

impl Report for CsvReport {
    fn record_drop(&mut self, spec: &DropSpec, timestamp: i64) {
        let date = DateTime::from_timestamp(timestamp, 0)
            .map(|dt| dt.format("%m/%d/%Y %H:%M:%S").to_string())
            .unwrap_or_default();

        self.rows.push(Self::row(&[
            date,
            timestamp.to_string(),
            spec.description.clone(),
            spec.item_id.to_string(),
        ]));
    }

    fn finish(&mut self) -> LimiterResult<()> {
        if self.rows.is_empty() {
            return Ok(());
        }

        let fail = |e: std::io::Error| {
            LimiterError::Storage(format!("failed to write report {}: {e}", self.path.display()))
        };

        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(fail)?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writer.write_all(Self::row(&CSV_HEADER).as_bytes()).map_err(fail)?;
        }
        for row in &self.rows {
            writer.write_all(row.as_bytes()).map_err(fail)?;
        }
        writer.flush().map_err(fail)?;

        debug!("Wrote {} report rows to {}", self.rows.len(), self.path.display());
        self.rows.clear();
        Ok(())
    }
}
