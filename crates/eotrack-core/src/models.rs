use std::collections::HashSet;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// A raw executive order record as scraped from the source feed.
///
/// Every field carries an explicit presence contract: textual fields are
/// `None` when the CSV cell is empty, never a sentinel string. The trimmed,
/// non-empty `link` is the canonical identity of a record; everything else
/// is payload. Records are append-only: the first observation of a link
/// is the one that is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RawRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub content: Option<String>,
    pub page_number: Option<u32>,
}

impl RawRecord {
    /// The canonical identity of this record: the trimmed link, if present.
    ///
    /// Records without a key cannot participate in dedupe or diffing.
    pub fn key(&self) -> Option<&str> {
        match self.link.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(link) => Some(link),
        }
    }
}

/// A raw record plus its generated summary.
///
/// Kept flat (rather than embedding `RawRecord`) so it maps 1:1 onto a
/// snapshot CSV row. Once a link has a summary, that summary is carried
/// byte-identical into every later snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummarizedRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub content: Option<String>,
    pub page_number: Option<u32>,
    pub summary: String,
}

impl SummarizedRecord {
    pub fn from_raw(record: &RawRecord, summary: String) -> Self {
        Self {
            title: record.title.clone(),
            link: record.link.clone(),
            date: record.date.clone(),
            content: record.content.clone(),
            page_number: record.page_number,
            summary,
        }
    }

    /// Canonical identity, same contract as [`RawRecord::key`].
    pub fn key(&self) -> Option<&str> {
        match self.link.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(link) => Some(link),
        }
    }
}

/// An immutable, timestamp-identified summarization artifact.
///
/// Snapshots supersede but never overwrite earlier ones; the file name
/// carries the timestamp so lexical order equals chronological order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub records: Vec<SummarizedRecord>,
}

impl Snapshot {
    /// The set of links that have ever been successfully summarized
    /// as of this snapshot.
    pub fn links(&self) -> HashSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.key().map(str::to_string))
            .collect()
    }
}

/// A raw dataset as loaded from disk, with the fingerprint of the file
/// it came from (None when the file did not exist yet).
///
/// The fingerprint is handed back to `DatasetStore::commit`, which aborts
/// if the file on disk no longer matches it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<RawRecord>,
    pub fingerprint: Option<String>,
}

/// One row of the notification payload sent downstream.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeltaRecord {
    pub title: String,
    pub date: String,
    pub summary: String,
}

impl From<&SummarizedRecord> for DeltaRecord {
    fn from(record: &SummarizedRecord) -> Self {
        Self {
            title: record.title.clone().unwrap_or_default(),
            date: record.date.clone().unwrap_or_default(),
            summary: record.summary.clone(),
        }
    }
}

/// The payload consumed by the notification plumbing, newest record first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationPayload {
    pub new_eos: Vec<DeltaRecord>,
}

/// Compute a SHA-256 hash of a byte slice, returned as 64-char hex.
///
/// Used as the optimistic-concurrency fingerprint for persisted artifacts.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
