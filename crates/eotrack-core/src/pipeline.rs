//! The pipeline driver: merge → gate → commit → summarize → publish.
//!
//! Each stage returns a typed result collected into the [`PipelineReport`];
//! there is no implicit signaling between stages. A failing gate is a
//! reportable outcome, not an error, and it stops the run before commit.
//! No stage undoes data durably committed by an earlier stage.

use chrono::{DateTime, Utc};

use crate::dataset::{self, MergeOutcome};
use crate::error::AppError;
use crate::models::RawRecord;
use crate::publish::{self, PublishOutcome};
use crate::quality::QualityReport;
use crate::summarize::{SummarizeOutcome, SummarizeService};
use crate::traits::{DatasetStore, PublicTarget, SnapshotStore, Summarizer};

/// Typed result of a full pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Candidate records handed to the merge stage.
    pub candidates: usize,
    /// Records appended by the merge.
    pub added: usize,
    /// Size of the merged dataset the gate evaluated.
    pub dataset_size: usize,
    /// The full per-check quality report.
    pub quality: QualityReport,
    /// Whether the merged dataset was committed to disk.
    pub committed: bool,
    /// Present when the gate passed and summarization ran.
    pub summarize: Option<SummarizeOutcome>,
    /// Present when publication succeeded.
    pub publish: Option<PublishOutcome>,
    /// Publish failure, if any; earlier stages stay committed.
    pub publish_error: Option<String>,
}

impl PipelineReport {
    pub fn gate_passed(&self) -> bool {
        self.quality.gate_passes()
    }
}

/// Orchestrates the batch pipeline over injected stores and summarizer.
pub struct PipelineService<D, S, P, M>
where
    D: DatasetStore,
    S: SnapshotStore,
    P: PublicTarget,
    M: Summarizer,
{
    dataset: D,
    snapshots: S,
    public: P,
    summarizer: SummarizeService<M>,
}

impl<D, S, P, M> PipelineService<D, S, P, M>
where
    D: DatasetStore,
    S: SnapshotStore,
    P: PublicTarget,
    M: Summarizer,
{
    pub fn new(dataset: D, snapshots: S, public: P, summarizer: SummarizeService<M>) -> Self {
        Self {
            dataset,
            snapshots,
            public,
            summarizer,
        }
    }

    /// Run the full pipeline for one batch of candidate records.
    ///
    /// 1. Load the persisted dataset
    /// 2. Merge candidates (append-only, keyed by link)
    /// 3. Quality-gate the merged dataset
    /// 4. Commit, only if the gate passed and the merge added records
    /// 5. Incrementally summarize against the previous snapshot
    /// 6. Publish the latest snapshot and derive the delta
    pub async fn run(
        &self,
        candidates: Vec<RawRecord>,
        now: DateTime<Utc>,
    ) -> Result<PipelineReport, AppError> {
        let candidate_count = candidates.len();

        // 1 & 2. Load + merge
        let loaded = self.dataset.load()?;
        tracing::info!(existing = loaded.records.len(), candidates = candidate_count, "Loaded dataset");
        let merge: MergeOutcome = dataset::merge(&loaded.records, candidates);

        // 3. Gate
        let quality = QualityReport::evaluate(&merge.records, now.date_naive());
        if !quality.gate_passes() {
            tracing::error!(score = quality.score(), "Quality gate failed; dataset not committed");
            return Ok(PipelineReport {
                candidates: candidate_count,
                added: merge.added,
                dataset_size: merge.records.len(),
                quality,
                committed: false,
                summarize: None,
                publish: None,
                publish_error: None,
            });
        }

        // 4. Commit. A merge with nothing new touches no file.
        let committed = if merge.has_new() {
            self.dataset
                .commit(&merge.records, loaded.fingerprint.as_deref())?;
            tracing::info!(records = merge.records.len(), "Committed merged dataset");
            true
        } else {
            tracing::info!("No new records; dataset left untouched");
            false
        };

        // 5. Summarize against the snapshot that was latest before this run.
        let previous = self.snapshots.latest()?;
        let summarize = self
            .summarizer
            .run(&merge.records, previous.as_ref(), &self.snapshots, now)
            .await?;

        // 6. Publish. Failure here does not undo the stages above.
        let (publish, publish_error) = match publish::publish(&self.snapshots, &self.public) {
            Ok(outcome) => (Some(outcome), None),
            Err(err) => {
                tracing::error!(error = %err, "Publish step failed");
                (None, Some(err.to_string()))
            }
        };

        Ok(PipelineReport {
            candidates: candidate_count,
            added: merge.added,
            dataset_size: merge.records.len(),
            quality,
            committed,
            summarize: Some(summarize),
            publish,
            publish_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::SummarizeOptions;
    use crate::testutil::{
        MemoryDatasetStore, MemoryPublicTarget, MemorySnapshotStore, MockSummarizer, make_record,
        test_now,
    };
    use std::time::Duration;

    fn service(
        dataset: MemoryDatasetStore,
        snapshots: MemorySnapshotStore,
        summarizer: MockSummarizer,
    ) -> PipelineService<MemoryDatasetStore, MemorySnapshotStore, MemoryPublicTarget, MockSummarizer>
    {
        let public = MemoryPublicTarget::new(snapshots.clone());
        PipelineService::new(
            dataset,
            snapshots,
            public,
            SummarizeService::with_options(
                summarizer,
                SummarizeOptions {
                    max_retries: 0,
                    pause: Duration::ZERO,
                },
            ),
        )
    }

    #[tokio::test]
    async fn full_run_commits_summarizes_and_publishes() {
        let dataset = MemoryDatasetStore::empty();
        let snapshots = MemorySnapshotStore::empty();
        let svc = service(dataset.clone(), snapshots.clone(), MockSummarizer::always("s"));

        let candidates: Vec<_> = (1..=20).map(make_record).collect();
        let report = svc.run(candidates, test_now()).await.unwrap();

        assert!(report.gate_passed());
        assert!(report.committed);
        assert_eq!(report.added, 20);
        let summarize = report.summarize.unwrap();
        assert_eq!(summarize.new_links, 20);
        let publish = report.publish.unwrap();
        assert_eq!(publish.published, 20);
        assert_eq!(publish.delta.len(), 20);
        assert_eq!(dataset.committed_count(), 1);
    }

    #[tokio::test]
    async fn gate_failure_blocks_commit_and_everything_after() {
        // The merge dedupes candidate links, so a duplicate can only reach
        // the gate through an already-corrupt persisted dataset.
        let mut seeded: Vec<_> = (1..=10).map(make_record).collect();
        seeded[9].link = seeded[0].link.clone();
        seeded[9].title = Some("Different title, same link".into());
        let dataset = MemoryDatasetStore::with_records(seeded);
        let snapshots = MemorySnapshotStore::empty();
        let svc = service(dataset.clone(), snapshots.clone(), MockSummarizer::always("s"));

        let report = svc.run(vec![], test_now()).await.unwrap();

        assert!(!report.gate_passed());
        assert!(!report.committed);
        assert!(report.summarize.is_none());
        assert!(report.publish.is_none());
        assert_eq!(dataset.committed_count(), 0);
        assert!(snapshots.latest().unwrap().is_none());
    }

    #[tokio::test]
    async fn rerun_with_same_candidates_is_idempotent() {
        let dataset = MemoryDatasetStore::empty();
        let snapshots = MemorySnapshotStore::empty();
        let svc = service(dataset.clone(), snapshots.clone(), MockSummarizer::always("s"));

        let candidates: Vec<_> = (1..=5).map(make_record).collect();
        let first = svc.run(candidates.clone(), test_now()).await.unwrap();
        assert!(first.committed);
        assert_eq!(first.summarize.unwrap().new_links, 5);

        let second = svc.run(candidates, test_now()).await.unwrap();
        assert!(!second.committed); // no-op: no file touched
        assert_eq!(second.dataset_size, 5);
        let summarize = second.summarize.unwrap();
        assert_eq!(summarize.new_links, 0);
        assert_eq!(summarize.total_records, 5);
        // Republishing identical content notifies nobody.
        assert!(second.publish.unwrap().delta.is_empty());
        assert_eq!(dataset.committed_count(), 1);
    }

    #[tokio::test]
    async fn summaries_are_immutable_across_runs() {
        let dataset = MemoryDatasetStore::empty();
        let snapshots = MemorySnapshotStore::empty();

        let first_batch: Vec<_> = (1..=3).map(make_record).collect();
        let svc = service(
            dataset.clone(),
            snapshots.clone(),
            MockSummarizer::always("first run summary"),
        );
        svc.run(first_batch.clone(), test_now()).await.unwrap();

        let mut second_batch = first_batch;
        second_batch.push(make_record(4));
        let svc2 = service(
            dataset.clone(),
            snapshots.clone(),
            MockSummarizer::always("second run summary"),
        );
        let report = svc2.run(second_batch, test_now()).await.unwrap();

        assert_eq!(report.summarize.unwrap().new_links, 1);
        let latest = snapshots.latest().unwrap().unwrap();
        assert_eq!(latest.records.len(), 4);
        assert_eq!(
            latest
                .records
                .iter()
                .filter(|r| r.summary == "first run summary")
                .count(),
            3
        );
        assert_eq!(
            latest
                .records
                .iter()
                .filter(|r| r.summary == "second run summary")
                .count(),
            1
        );
    }
}
