//! Publication: republish the newest snapshot under the fixed public path
//! and derive the notification delta against what was published before.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::dates;
use crate::error::AppError;
use crate::models::{DeltaRecord, NotificationPayload};
use crate::traits::{PublicTarget, SnapshotStore};

/// What a publish run did.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// The snapshot that was copied to the public path.
    pub snapshot_path: PathBuf,
    /// Records now visible at the public path.
    pub published: usize,
    /// Records newly visible compared to the previous publication,
    /// newest date first.
    pub delta: Vec<DeltaRecord>,
}

impl PublishOutcome {
    /// The notification payload, or None when nothing new became visible
    /// (no notification is emitted for an empty delta).
    pub fn notification(&self) -> Option<NotificationPayload> {
        if self.delta.is_empty() {
            None
        } else {
            Some(NotificationPayload {
                new_eos: self.delta.clone(),
            })
        }
    }
}

/// Select the latest snapshot, republish it verbatim, and compute the delta.
///
/// The delta is re-derived here from the published files alone; it shares
/// no state with the summarizer's diff, the two agree by construction.
/// A missing snapshot is fatal to this step only.
pub fn publish<S, P>(snapshots: &S, target: &P) -> Result<PublishOutcome, AppError>
where
    S: SnapshotStore,
    P: PublicTarget,
{
    let latest = snapshots.latest()?.ok_or(AppError::NoSnapshot)?;

    let old_links: HashSet<String> = target
        .current()?
        .map(|records| {
            records
                .iter()
                .filter_map(|r| r.key().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    target.replace_with(&latest.path)?;

    let mut delta: Vec<DeltaRecord> = latest
        .records
        .iter()
        .filter(|r| r.key().is_some_and(|key| !old_links.contains(key)))
        .map(DeltaRecord::from)
        .collect();
    dates::sort_newest_first(&mut delta, |d| Some(d.date.as_str()));

    tracing::info!(
        snapshot = %latest.path.display(),
        published = latest.records.len(),
        new = delta.len(),
        "Published latest snapshot"
    );

    Ok(PublishOutcome {
        snapshot_path: latest.path,
        published: latest.records.len(),
        delta,
    })
}
