//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::AppError;
use crate::models::{LoadedDataset, RawRecord, Snapshot, SummarizedRecord};
use crate::traits::{DatasetStore, Fetcher, PublicTarget, SnapshotStore, Summarizer};

/// Fixed run date used across tests; record fixtures are dated relative
/// to it so the recency check stays green.
pub fn test_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap()
}

/// A healthy record: canonical link, recent date, long clean content.
pub fn make_record(n: usize) -> RawRecord {
    RawRecord {
        title: Some(format!("Executive Order {n}")),
        link: Some(format!(
            "https://www.whitehouse.gov/presidential-actions/executive-order-{n}/"
        )),
        date: Some("2025-04-10".into()),
        content: Some(format!(
            "By the authority vested in me as President, order {n} directs the following. {}",
            "Further policy detail follows here. ".repeat(8)
        )),
        page_number: Some((n / 10 + 1) as u32),
    }
}

pub fn make_record_with(link: &str, title: &str, date: &str, content: &str) -> RawRecord {
    RawRecord {
        title: Some(title.to_string()),
        link: Some(link.to_string()),
        date: Some(date.to_string()),
        content: Some(content.to_string()),
        page_number: Some(1),
    }
}

pub fn make_summarized(n: usize, summary: &str) -> SummarizedRecord {
    SummarizedRecord::from_raw(&make_record(n), summary.to_string())
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response per call.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(html.to_string())])),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSummarizer
// ---------------------------------------------------------------------------

/// Mock summarizer with a scripted response queue and recorded calls.
#[derive(Clone)]
pub struct MockSummarizer {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSummarizer {
    /// Returns the same summary for every call.
    pub fn always(summary: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: Some(summary.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pops one scripted response per call; errors once exhausted.
    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Titles passed to `summarize`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        title: &str,
        _date: &str,
        _content: &str,
    ) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(title.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            match &self.fallback {
                Some(summary) => Ok(summary.clone()),
                None => Err(AppError::LlmError {
                    message: "mock response queue exhausted".into(),
                    status_code: 500,
                    retryable: false,
                }),
            }
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryDatasetStore
// ---------------------------------------------------------------------------

/// In-memory dataset store with a version counter standing in for the
/// on-disk fingerprint.
#[derive(Clone)]
pub struct MemoryDatasetStore {
    records: Arc<Mutex<Vec<RawRecord>>>,
    version: Arc<Mutex<u64>>,
    commits: Arc<Mutex<Vec<Vec<RawRecord>>>>,
}

impl MemoryDatasetStore {
    /// No persisted file yet.
    pub fn empty() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            version: Arc::new(Mutex::new(0)),
            commits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Store seeded with an existing persisted dataset.
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            version: Arc::new(Mutex::new(1)),
            commits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn committed_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    /// Simulate a concurrent run writing underneath us.
    pub fn bump_version(&self) {
        *self.version.lock().unwrap() += 1;
    }
}

impl DatasetStore for MemoryDatasetStore {
    fn load(&self) -> Result<LoadedDataset, AppError> {
        let version = *self.version.lock().unwrap();
        Ok(LoadedDataset {
            records: self.records.lock().unwrap().clone(),
            fingerprint: (version > 0).then(|| version.to_string()),
        })
    }

    fn commit(
        &self,
        records: &[RawRecord],
        expected_fingerprint: Option<&str>,
    ) -> Result<(), AppError> {
        let mut version = self.version.lock().unwrap();
        let current = (*version > 0).then(|| version.to_string());
        if current.as_deref() != expected_fingerprint {
            return Err(AppError::StoreConflict {
                expected: expected_fingerprint.unwrap_or("<none>").to_string(),
                found: current.unwrap_or_else(|| "<none>".to_string()),
            });
        }
        *self.records.lock().unwrap() = records.to_vec();
        *version += 1;
        self.commits.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySnapshotStore
// ---------------------------------------------------------------------------

/// In-memory snapshot store; paths are synthetic but unique and ordered.
#[derive(Clone)]
pub struct MemorySnapshotStore {
    entries: Arc<Mutex<Vec<(PathBuf, Vec<SummarizedRecord>)>>>,
}

impl MemorySnapshotStore {
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records of the most recently written snapshot.
    pub fn last_written(&self) -> Option<Vec<SummarizedRecord>> {
        self.entries
            .lock()
            .unwrap()
            .last()
            .map(|(_, records)| records.clone())
    }

    /// Convenience wrapper over the trait method for test setup.
    pub fn write_records(&self, records: &[SummarizedRecord], written_at: DateTime<Utc>) -> PathBuf {
        SnapshotStore::write(self, records, written_at).unwrap()
    }

    pub fn find(&self, path: &Path) -> Option<Vec<SummarizedRecord>> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, records)| records.clone())
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn latest(&self) -> Result<Option<Snapshot>, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .last()
            .map(|(path, records)| Snapshot {
                path: path.clone(),
                records: records.clone(),
            }))
    }

    fn write(
        &self,
        records: &[SummarizedRecord],
        written_at: DateTime<Utc>,
    ) -> Result<PathBuf, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let path = PathBuf::from(format!(
            "executive_orders_summarized_{}_{:03}.csv",
            written_at.format("%Y-%m-%d_%H%M%S"),
            entries.len(),
        ));
        entries.push((path.clone(), records.to_vec()));
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// MemoryPublicTarget
// ---------------------------------------------------------------------------

/// In-memory public target backed by a [`MemorySnapshotStore`], so that
/// `replace_with` can resolve a snapshot path to its records.
#[derive(Clone)]
pub struct MemoryPublicTarget {
    store: MemorySnapshotStore,
    site: Arc<Mutex<Option<Vec<SummarizedRecord>>>>,
}

impl MemoryPublicTarget {
    pub fn new(store: MemorySnapshotStore) -> Self {
        Self {
            store,
            site: Arc::new(Mutex::new(None)),
        }
    }

    pub fn published(&self) -> Option<Vec<SummarizedRecord>> {
        self.site.lock().unwrap().clone()
    }
}

impl PublicTarget for MemoryPublicTarget {
    fn current(&self) -> Result<Option<Vec<SummarizedRecord>>, AppError> {
        Ok(self.site.lock().unwrap().clone())
    }

    fn replace_with(&self, snapshot: &Path) -> Result<(), AppError> {
        let records = self.store.find(snapshot).ok_or_else(|| {
            AppError::StoreError(format!("unknown snapshot {}", snapshot.display()))
        })?;
        *self.site.lock().unwrap() = Some(records);
        Ok(())
    }
}
