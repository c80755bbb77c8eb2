use std::fs;
use std::path::PathBuf;

use eotrack_core::error::AppError;
use eotrack_core::models::{LoadedDataset, RawRecord, compute_hash};
use eotrack_core::traits::DatasetStore;

/// The append-only raw dataset, persisted as a single CSV file.
///
/// Columns: `title, link, date, content, page_number`. Commits are
/// optimistic: the caller hands back the fingerprint it loaded, and the
/// write is aborted if the file on disk has changed since. The new content
/// is written to a temp file in the same directory and renamed into place,
/// so readers never observe a half-written dataset.
#[derive(Clone)]
pub struct CsvDatasetStore {
    path: PathBuf,
}

impl CsvDatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn fingerprint_on_disk(&self) -> Result<Option<String>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(compute_hash(&bytes)))
    }
}

impl DatasetStore for CsvDatasetStore {
    fn load(&self) -> Result<LoadedDataset, AppError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No existing dataset file; starting empty");
            return Ok(LoadedDataset {
                records: Vec::new(),
                fingerprint: None,
            });
        }

        let bytes = fs::read(&self.path)?;
        let fingerprint = compute_hash(&bytes);
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let records: Vec<RawRecord> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .map_err(|e| {
                AppError::StoreError(format!("reading {}: {e}", self.path.display()))
            })?;

        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Loaded existing dataset"
        );
        Ok(LoadedDataset {
            records,
            fingerprint: Some(fingerprint),
        })
    }

    fn commit(
        &self,
        records: &[RawRecord],
        expected_fingerprint: Option<&str>,
    ) -> Result<(), AppError> {
        // Verify nothing wrote underneath us since load.
        let current = self.fingerprint_on_disk()?;
        if current.as_deref() != expected_fingerprint {
            return Err(AppError::StoreConflict {
                expected: expected_fingerprint.unwrap_or("<no file>").to_string(),
                found: current.unwrap_or_else(|| "<no file>".to_string()),
            });
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for record in records {
                writer.serialize(record).map_err(|e| {
                    AppError::StoreError(format!("writing {}: {e}", self.path.display()))
                })?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| {
            AppError::StoreError(format!("replacing {}: {e}", self.path.display()))
        })?;

        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Committed dataset"
        );
        Ok(())
    }
}
