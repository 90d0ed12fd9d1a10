// src/utils/report.rs: cumulative per-stage timing table

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use log::info;

use crate::utils::file::ensure_dir;

pub const LABEL_COLUMN: &str = "program";
pub const SECONDS_COLUMN: &str = "elapsed_seconds";


#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    pub label: String,
    pub seconds: f64,
}

/// Ordered (label, seconds) records of a run.
#[derive(Debug, Default, Clone)]
pub struct TimingReport {
    records: Vec<TimingRecord>,
}

impl TimingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &str, seconds: f64) {
        self.records.push(TimingRecord {
            label: label.to_string(),
            seconds: seconds.max(0.0),
        });
    }

    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the records as a tab-separated table. An existing table gets the rows
    /// appended after its last row; a new one starts with a header row.
    ///
    /// # Arguments
    ///
    /// * `path` - Table location.
    ///
    /// # Returns
    /// Number of rows written.
    pub fn persist(&self, path: &Path) -> Result<usize> {
        let exists = path.is_file();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);

        if !exists {
            writer.write_record([LABEL_COLUMN, SECONDS_COLUMN])?;
        }
        for record in &self.records {
            let seconds = format!("{:.2}", record.seconds);
            writer.write_record([record.label.as_str(), seconds.as_str()])?;
        }
        writer.flush()?;

        if exists {
            info!("New timings appended to {}", path.display());
        } else {
            info!("Timing report saved to {}", path.display());
        }
        Ok(self.records.len())
    }
}

/// Reads a persisted table back (header skipped).
pub fn load(path: &Path) -> Result<Vec<TimingRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(TimingRecord {
            label: row.get(0).unwrap_or_default().to_string(),
            seconds: row.get(1).unwrap_or("0").parse()?,
        });
    }
    Ok(records)
}
