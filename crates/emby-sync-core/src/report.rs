use anyhow::{Context, Result};
use emby_sync_models::MissingRecord;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const HEADER: [&str; 6] = ["collection", "title", "year", "reason", "importer", "recorded_at"];

/// Sink for catalog entries that did not make it into their collection.
///
/// Implementations must not fail the run: write errors are logged and dropped.
pub trait MissingReporter: Send + Sync {
    fn record(&self, record: &MissingRecord);
}

/// Discards records; misses are still logged by the reconciler.
pub struct NoopReporter;

impl MissingReporter for NoopReporter {
    fn record(&self, _record: &MissingRecord) {}
}

/// Append-only CSV report, one row per miss.
pub struct CsvMissingReport {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvMissingReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &MissingRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("report writer lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// All rows of the report at `path`; a missing file is an empty report.
    pub fn load(path: &Path) -> Result<Vec<MissingRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row.with_context(|| format!("Malformed row in {}", path.display()))?);
        }
        Ok(records)
    }

    /// Writes `records` as a fresh report at `path`.
    pub fn export(records: &[MissingRecord], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Truncates the report to just its header.
    pub fn clear(path: &Path) -> Result<()> {
        Self::export(&[], path)
    }
}

impl MissingReporter for CsvMissingReport {
    fn record(&self, record: &MissingRecord) {
        match self.append(record) {
            Ok(()) => debug!(title = %record.title, collection = %record.collection, "Recorded missing item"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to write missing-item report"),
        }
    }
}
