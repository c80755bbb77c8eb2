use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{LoadedDataset, RawRecord, Snapshot, SummarizedRecord};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// The external summarization capability.
///
/// A pure function of the record content: the same input always produces
/// an equivalent summary, so retries are safe. May fail or time out.
pub trait Summarizer: Send + Sync + Clone {
    fn summarize(
        &self,
        title: &str,
        date: &str,
        content: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists the append-only raw dataset.
pub trait DatasetStore: Send + Sync + Clone {
    /// Load the current dataset along with its on-disk fingerprint.
    fn load(&self) -> Result<LoadedDataset, AppError>;

    /// Write the merged dataset, verifying first that the file on disk
    /// still matches `expected_fingerprint` (None = file must not exist).
    ///
    /// Returns `AppError::StoreConflict` when another run wrote in between.
    fn commit(
        &self,
        records: &[RawRecord],
        expected_fingerprint: Option<&str>,
    ) -> Result<(), AppError>;
}

/// Persists immutable, timestamped snapshot artifacts.
pub trait SnapshotStore: Send + Sync + Clone {
    /// The most recent snapshot, by timestamp, or None if none exists yet.
    fn latest(&self) -> Result<Option<Snapshot>, AppError>;

    /// Write a new snapshot artifact stamped with `written_at`.
    ///
    /// Never overwrites: refuses if an artifact with the same identity
    /// already exists. Returns the path of the new artifact.
    fn write(
        &self,
        records: &[SummarizedRecord],
        written_at: DateTime<Utc>,
    ) -> Result<PathBuf, AppError>;
}

/// The fixed public path the presentation layer reads.
pub trait PublicTarget: Send + Sync + Clone {
    /// The records currently published, or None if nothing was published yet.
    fn current(&self) -> Result<Option<Vec<SummarizedRecord>>, AppError>;

    /// Replace the published copy with a verbatim copy of `snapshot`.
    fn replace_with(&self, snapshot: &Path) -> Result<(), AppError>;
}
