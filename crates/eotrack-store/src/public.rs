use std::fs;
use std::path::{Path, PathBuf};

use eotrack_core::error::AppError;
use eotrack_core::models::SummarizedRecord;
use eotrack_core::traits::PublicTarget;

/// The fixed public path the presentation layer reads.
///
/// Unlike snapshot artifacts this file is replaced on every publish; the
/// replacement is a verbatim byte copy of the chosen snapshot, staged
/// through a temp file and renamed into place.
#[derive(Clone)]
pub struct PublicCsvTarget {
    path: PathBuf,
}

impl PublicCsvTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PublicTarget for PublicCsvTarget {
    fn current(&self) -> Result<Option<Vec<SummarizedRecord>>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let records = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::StoreError(format!("reading {}: {e}", self.path.display())))?;
        Ok(Some(records))
    }

    fn replace_with(&self, snapshot: &Path) -> Result<(), AppError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let bytes = fs::read(snapshot)?;
        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        fs::write(tmp.path(), &bytes)?;
        tmp.persist(&self.path).map_err(|e| {
            AppError::StoreError(format!("replacing {}: {e}", self.path.display()))
        })?;

        tracing::info!(
            from = %snapshot.display(),
            to = %self.path.display(),
            "Republished latest snapshot"
        );
        Ok(())
    }
}
