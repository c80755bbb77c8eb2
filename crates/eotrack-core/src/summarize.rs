//! Incremental summarization: diff the committed dataset against the last
//! snapshot, summarize only unseen links, and write a new immutable artifact.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dates;
use crate::error::AppError;
use crate::models::{RawRecord, Snapshot, SummarizedRecord};
use crate::traits::{SnapshotStore, Summarizer};

/// Knobs for the external-call loop.
#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    /// Additional attempts after the first, for retryable errors only.
    pub max_retries: u32,
    /// Pause between external calls (and before each retry).
    pub pause: Duration,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            pause: Duration::from_secs(2),
        }
    }
}

/// What a summarization run did.
#[derive(Debug, Clone)]
pub struct SummarizeOutcome {
    /// Records present in the dataset but absent from the previous snapshot.
    pub new_links: usize,
    /// How many of those were successfully summarized this run.
    pub summarized: usize,
    /// New records skipped (blank content or summarization failure); they
    /// stay out of the snapshot and reappear as new on the next run.
    pub skipped: usize,
    /// Total records in the snapshot that was written.
    pub total_records: usize,
    /// Path of the newly written snapshot artifact.
    pub snapshot_path: PathBuf,
}

impl SummarizeOutcome {
    /// The status line contract consumed by downstream automation.
    ///
    /// The `Found {N} ...` form is emitted only when N > 0; a run with
    /// nothing to process reports that in prose instead.
    pub fn status_line(&self) -> String {
        if self.new_links > 0 {
            format!("Found {} new executive orders to process", self.new_links)
        } else {
            "No new executive orders found to process.".to_string()
        }
    }
}

/// Drives incremental summarization against an injected [`Summarizer`].
#[derive(Clone)]
pub struct SummarizeService<M: Summarizer> {
    summarizer: M,
    options: SummarizeOptions,
}

impl<M: Summarizer> SummarizeService<M> {
    pub fn new(summarizer: M) -> Self {
        Self {
            summarizer,
            options: SummarizeOptions::default(),
        }
    }

    pub fn with_options(summarizer: M, options: SummarizeOptions) -> Self {
        Self {
            summarizer,
            options,
        }
    }

    /// Summarize every dataset record whose link is absent from `previous`,
    /// then write a new snapshot: the previous records carried forward
    /// unchanged plus the newly summarized ones.
    ///
    /// With nothing new, no external call is made and the new snapshot's
    /// content is identical to the previous one (fresh timestamp only).
    pub async fn run<S: SnapshotStore>(
        &self,
        dataset: &[RawRecord],
        previous: Option<&Snapshot>,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<SummarizeOutcome, AppError> {
        let prev_links = previous.map(Snapshot::links).unwrap_or_default();
        let carried: Vec<SummarizedRecord> = previous
            .map(|s| s.records.clone())
            .unwrap_or_default();

        // Dedupe against every link ever summarized, never against calls
        // made within this run only.
        let new: Vec<&RawRecord> = dataset
            .iter()
            .filter(|r| r.key().is_some_and(|key| !prev_links.contains(key)))
            .collect();

        tracing::info!(
            dataset = dataset.len(),
            previously_summarized = prev_links.len(),
            new = new.len(),
            "Computed incremental diff"
        );

        if new.is_empty() {
            let path = store.write(&carried, now)?;
            return Ok(SummarizeOutcome {
                new_links: 0,
                summarized: 0,
                skipped: 0,
                total_records: carried.len(),
                snapshot_path: path,
            });
        }

        let mut fresh: Vec<SummarizedRecord> = Vec::new();
        let mut skipped = 0usize;
        for (i, record) in new.iter().enumerate() {
            let title = record.title.as_deref().unwrap_or("");
            tracing::info!(n = i + 1, of = new.len(), title, "Processing executive order");

            let content = record.content.as_deref().unwrap_or("").trim();
            if content.is_empty() {
                tracing::warn!(title, "Skipping: no content available");
                skipped += 1;
                continue;
            }

            let date = record.date.as_deref().unwrap_or("");
            match self.summarize_with_retry(title, date, content).await {
                Ok(summary) => {
                    tracing::info!(title, chars = summary.len(), "Summary generated");
                    fresh.push(SummarizedRecord::from_raw(record, summary));
                }
                Err(err) => {
                    // Left out of the snapshot: the link stays unsummarized
                    // and is retried on the next run.
                    tracing::warn!(title, error = %err, "Summarization failed, skipping record");
                    skipped += 1;
                }
            }

            if i + 1 < new.len() && !self.options.pause.is_zero() {
                tokio::time::sleep(self.options.pause).await;
            }
        }

        let mut combined = carried;
        combined.extend(fresh.iter().cloned());
        dates::sort_newest_first(&mut combined, |r| r.date.as_deref());

        let path = store.write(&combined, now)?;
        Ok(SummarizeOutcome {
            new_links: new.len(),
            summarized: fresh.len(),
            skipped,
            total_records: combined.len(),
            snapshot_path: path,
        })
    }

    async fn summarize_with_retry(
        &self,
        title: &str,
        date: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let mut attempt = 0u32;
        loop {
            match self.summarizer.summarize(title, date, content).await {
                Ok(summary) => return Ok(summary),
                Err(err) if err.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        title,
                        attempt,
                        error = %err,
                        "Retryable summarization error, retrying"
                    );
                    if !self.options.pause.is_zero() {
                        tokio::time::sleep(self.options.pause).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        MemorySnapshotStore, MockSummarizer, make_record, make_summarized, test_now,
    };

    fn fast() -> SummarizeOptions {
        SummarizeOptions {
            max_retries: 2,
            pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn summarizes_only_unseen_links() {
        // Scenario A, scaled: prior snapshot with 100 records, 3 new links.
        let carried: Vec<SummarizedRecord> =
            (1..=100).map(|n| make_summarized(n, "older summary")).collect();
        let previous = Snapshot {
            path: "snap-0".into(),
            records: carried.clone(),
        };
        let dataset: Vec<RawRecord> = (1..=103).map(make_record).collect();

        let store = MemorySnapshotStore::empty();
        let summarizer = MockSummarizer::always("fresh summary");
        let svc = SummarizeService::with_options(summarizer.clone(), fast());

        let outcome = svc
            .run(&dataset, Some(&previous), &store, test_now())
            .await
            .unwrap();

        assert_eq!(outcome.new_links, 3);
        assert_eq!(outcome.summarized, 3);
        assert_eq!(outcome.total_records, 103);
        assert_eq!(
            outcome.status_line(),
            "Found 3 new executive orders to process"
        );
        assert_eq!(summarizer.calls().len(), 3);

        // The 100 prior summaries are carried forward byte-identical.
        let written = store.last_written().unwrap();
        assert_eq!(written.len(), 103);
        for prior in &carried {
            let found = written
                .iter()
                .find(|r| r.key() == prior.key())
                .expect("prior record missing from new snapshot");
            assert_eq!(found.summary, prior.summary);
        }
        assert_eq!(
            written
                .iter()
                .filter(|r| r.summary == "fresh summary")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn empty_diff_makes_no_calls_and_carries_content_forward() {
        // Scenario E.
        let previous = Snapshot {
            path: "snap-0".into(),
            records: (1..=5).map(|n| make_summarized(n, "kept")).collect(),
        };
        let dataset: Vec<RawRecord> = (1..=5).map(make_record).collect();

        let store = MemorySnapshotStore::empty();
        let summarizer = MockSummarizer::always("never used");
        let svc = SummarizeService::with_options(summarizer.clone(), fast());

        let outcome = svc
            .run(&dataset, Some(&previous), &store, test_now())
            .await
            .unwrap();

        assert_eq!(outcome.new_links, 0);
        assert_eq!(
            outcome.status_line(),
            "No new executive orders found to process."
        );
        assert!(summarizer.calls().is_empty());
        assert_eq!(store.last_written().unwrap(), previous.records);
    }

    #[tokio::test]
    async fn no_previous_snapshot_processes_everything() {
        let dataset: Vec<RawRecord> = (1..=4).map(make_record).collect();
        let store = MemorySnapshotStore::empty();
        let svc = SummarizeService::with_options(MockSummarizer::always("s"), fast());

        let outcome = svc.run(&dataset, None, &store, test_now()).await.unwrap();
        assert_eq!(outcome.new_links, 4);
        assert_eq!(outcome.total_records, 4);
    }

    #[tokio::test]
    async fn per_record_failure_skips_without_aborting() {
        let dataset: Vec<RawRecord> = (1..=3).map(make_record).collect();
        let store = MemorySnapshotStore::empty();
        let summarizer = MockSummarizer::with_responses(vec![
            Ok("one".into()),
            Err(AppError::LlmError {
                message: "bad request".into(),
                status_code: 400,
                retryable: false,
            }),
            Ok("three".into()),
        ]);
        let svc = SummarizeService::with_options(summarizer, fast());

        let outcome = svc.run(&dataset, None, &store, test_now()).await.unwrap();
        assert_eq!(outcome.new_links, 3);
        assert_eq!(outcome.summarized, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(store.last_written().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn skipped_record_reappears_in_next_run() {
        let dataset: Vec<RawRecord> = (1..=2).map(make_record).collect();
        let store = MemorySnapshotStore::empty();

        // First run: the second record fails.
        let svc = SummarizeService::with_options(
            MockSummarizer::with_responses(vec![
                Ok("one".into()),
                Err(AppError::NetworkError("down".into())),
            ]),
            SummarizeOptions {
                max_retries: 0,
                pause: Duration::ZERO,
            },
        );
        svc.run(&dataset, None, &store, test_now()).await.unwrap();

        let previous = store.latest().unwrap().unwrap();
        assert_eq!(previous.records.len(), 1);

        // Second run: only the failed link is new again.
        let retry_svc = SummarizeService::with_options(MockSummarizer::always("two"), fast());
        let outcome = retry_svc
            .run(&dataset, Some(&previous), &store, test_now())
            .await
            .unwrap();
        assert_eq!(outcome.new_links, 1);
        assert_eq!(outcome.summarized, 1);
        assert_eq!(store.last_written().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_content_is_counted_but_not_called() {
        let mut dataset: Vec<RawRecord> = (1..=2).map(make_record).collect();
        dataset[1].content = Some("   ".into());
        let store = MemorySnapshotStore::empty();
        let summarizer = MockSummarizer::always("s");
        let svc = SummarizeService::with_options(summarizer.clone(), fast());

        let outcome = svc.run(&dataset, None, &store, test_now()).await.unwrap();
        assert_eq!(outcome.new_links, 2);
        assert_eq!(outcome.summarized, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(summarizer.calls().len(), 1);
    }

    #[tokio::test]
    async fn retries_retryable_errors_then_succeeds() {
        let dataset: Vec<RawRecord> = vec![make_record(1)];
        let store = MemorySnapshotStore::empty();
        let summarizer = MockSummarizer::with_responses(vec![
            Err(AppError::RateLimitExceeded),
            Ok("after retry".into()),
        ]);
        let svc = SummarizeService::with_options(summarizer.clone(), fast());

        let outcome = svc.run(&dataset, None, &store, test_now()).await.unwrap();
        assert_eq!(outcome.summarized, 1);
        assert_eq!(summarizer.calls().len(), 2);
    }

    #[test]
    fn status_line_exact_format() {
        let outcome = SummarizeOutcome {
            new_links: 7,
            summarized: 7,
            skipped: 0,
            total_records: 7,
            snapshot_path: "x".into(),
        };
        assert_eq!(
            outcome.status_line(),
            "Found 7 new executive orders to process"
        );
    }
}
