use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use eotrack_core::error::AppError;
use eotrack_core::models::{Snapshot, SummarizedRecord};
use eotrack_core::traits::SnapshotStore;

/// File name prefix shared by every snapshot artifact.
pub const SNAPSHOT_PREFIX: &str = "executive_orders_summarized_";

/// Timestamp component of a snapshot file name. Lexical order of the
/// resulting names equals chronological order.
const SNAPSHOT_STAMP: &str = "%Y-%m-%d_%H%M%S";

/// Snapshot artifacts as timestamped CSV files in one output directory.
///
/// Columns: `title, link, date, content, page_number, summary`. Files are
/// append-only history: a run always writes a new artifact and existing
/// ones are never overwritten or deleted.
#[derive(Clone)]
pub struct CsvSnapshotStore {
    dir: PathBuf,
}

impl CsvSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All snapshot artifacts, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, AppError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| {
                        name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".csv")
                    })
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read the records of one snapshot artifact.
    pub fn read(&self, path: &Path) -> Result<Vec<SummarizedRecord>, AppError> {
        let bytes = fs::read(path)?;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        reader
            .deserialize()
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::StoreError(format!("reading {}: {e}", path.display())))
    }
}

impl SnapshotStore for CsvSnapshotStore {
    fn latest(&self) -> Result<Option<Snapshot>, AppError> {
        let Some(path) = self.list()?.pop() else {
            return Ok(None);
        };
        let records = self.read(&path)?;
        Ok(Some(Snapshot { path, records }))
    }

    fn write(
        &self,
        records: &[SummarizedRecord],
        written_at: DateTime<Utc>,
    ) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir)?;
        let name = format!("{SNAPSHOT_PREFIX}{}.csv", written_at.format(SNAPSHOT_STAMP));
        let path = self.dir.join(name);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for record in records {
                writer.serialize(record).map_err(|e| {
                    AppError::StoreError(format!("writing {}: {e}", path.display()))
                })?;
            }
            writer.flush()?;
        }
        // Snapshots are immutable: refuse to clobber an existing artifact.
        tmp.persist_noclobber(&path).map_err(|e| {
            AppError::StoreError(format!(
                "snapshot {} already exists or could not be written: {e}",
                path.display()
            ))
        })?;

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "Wrote snapshot"
        );
        Ok(path)
    }
}
