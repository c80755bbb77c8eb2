pub mod dataset;
pub mod public;
pub mod snapshot;

pub use dataset::CsvDatasetStore;
pub use public::PublicCsvTarget;
pub use snapshot::{CsvSnapshotStore, SNAPSHOT_PREFIX};
