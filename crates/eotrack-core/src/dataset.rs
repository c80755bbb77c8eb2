use std::collections::HashSet;

use crate::models::RawRecord;

/// Result of merging freshly fetched candidates into the persisted dataset.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged dataset: every existing record verbatim, then every
    /// genuinely new candidate in discovery order.
    pub records: Vec<RawRecord>,
    /// Candidates appended because their link was unseen.
    pub added: usize,
    /// Candidates discarded because their link was already present.
    pub already_present: usize,
    /// Candidates dropped because they carry no usable link.
    pub unkeyed: usize,
}

impl MergeOutcome {
    /// True when the merge changed the dataset; a `false` here makes the
    /// subsequent commit a no-op (no file touched).
    pub fn has_new(&self) -> bool {
        self.added > 0
    }
}

/// Merge candidates into the existing dataset, keyed by link.
///
/// Existing records are preserved verbatim and never updated in place.
/// A candidate whose link already exists (in the dataset or earlier in the
/// same candidate batch) is discarded silently; a candidate without a link
/// cannot be keyed and is dropped with a warning.
pub fn merge(existing: &[RawRecord], candidates: Vec<RawRecord>) -> MergeOutcome {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|r| r.key().map(str::to_string))
        .collect();

    let mut records = existing.to_vec();
    let mut added = 0;
    let mut already_present = 0;
    let mut unkeyed = 0;

    for candidate in candidates {
        match candidate.key() {
            None => {
                tracing::warn!(
                    title = candidate.title.as_deref().unwrap_or("<untitled>"),
                    "Dropping candidate without a link"
                );
                unkeyed += 1;
            }
            Some(key) if seen.contains(key) => {
                tracing::debug!(link = key, "Skipping already collected record");
                already_present += 1;
            }
            Some(key) => {
                seen.insert(key.to_string());
                records.push(candidate);
                added += 1;
            }
        }
    }

    tracing::info!(
        added,
        already_present,
        unkeyed,
        total = records.len(),
        "Merged candidate records"
    );

    MergeOutcome {
        records,
        added,
        already_present,
        unkeyed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_record;

    #[test]
    fn appends_new_links_in_discovery_order() {
        let existing = vec![make_record(1)];
        let outcome = merge(&existing, vec![make_record(2), make_record(3)]);

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0], existing[0]);
        assert_eq!(outcome.records[1].key(), make_record(2).key());
        assert_eq!(outcome.records[2].key(), make_record(3).key());
    }

    #[test]
    fn discards_candidates_with_known_links() {
        let existing = vec![make_record(1), make_record(2)];

        // Same link, different observation; the first observation wins.
        let mut stale = make_record(1);
        stale.content = Some("a later re-scrape of the same order".into());

        let outcome = merge(&existing, vec![stale]);
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.already_present, 1);
        assert_eq!(outcome.records, existing);
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = vec![make_record(1)];
        let candidates = vec![make_record(2), make_record(3)];

        let once = merge(&existing, candidates.clone());
        let twice = merge(&once.records, candidates);

        assert_eq!(twice.added, 0);
        assert!(!twice.has_new());
        assert_eq!(once.records, twice.records);
    }

    #[test]
    fn deduplicates_within_the_candidate_batch() {
        let outcome = merge(&[], vec![make_record(1), make_record(1)]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.already_present, 1);
    }

    #[test]
    fn drops_candidates_without_a_link() {
        let mut unkeyed = make_record(1);
        unkeyed.link = Some("  ".into());

        let outcome = merge(&[], vec![unkeyed, make_record(2)]);
        assert_eq!(outcome.unkeyed, 1);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.records.len(), 1);
    }
}
