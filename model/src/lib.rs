//! Shared data model for the image catalog ingestion and derivation
//! service: entities (`Library`, `Collection`, `Image`, `Thumbnail`,
//! `CacheEntry`, `CacheRoot`, `BackgroundJob`, `ScheduledJob`,
//! `ScheduledJobRun`) and the message bus wire envelope.

pub mod cache_root;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod image;
pub mod job;
pub mod library;
pub mod schedule;

pub use cache_root::{CacheRoot, PathValidation};
pub use envelope::{
    normalize_locator, BulkOperationMessage, CollectionCreationMessage, CollectionScanMessage,
    DerivationMessage, Envelope, MessageKind, Queue,
};
pub use error::{ErrorKind, HandlerOutcome};
pub use ids::{
    BackgroundJobId, CacheRootId, CollectionId, ImageId, LibraryId, MessageId, ScheduledJobId,
    ScheduledJobRunId,
};
pub use image::{CacheEntry, Dimensions, Image, Thumbnail};
pub use job::{BackgroundJob, BackgroundJobStatus};
pub use library::{Collection, CollectionKind, CollectionStats, Library, MAX_EMBEDDED_IMAGES};
pub use schedule::{RunStatus, ScheduleKind, ScheduledJob, ScheduledJobRun, TriggeredBy};
