pub mod dataset;
pub mod dates;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod quality;
pub mod summarize;
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use models::{
    DeltaRecord, LoadedDataset, NotificationPayload, RawRecord, Snapshot, SummarizedRecord,
    compute_hash,
};
pub use quality::QualityReport;
pub use traits::{DatasetStore, Fetcher, PublicTarget, SnapshotStore, Summarizer};
