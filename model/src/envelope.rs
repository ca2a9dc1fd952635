use crate::ids::{BackgroundJobId, CollectionId, ImageId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The six logical queues, each bound to one topic routing pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Scan,
    Thumbnail,
    Cache,
    Creation,
    Bulk,
    Processing,
}

impl Queue {
    pub fn routing_pattern(self) -> &'static str {
        match self {
            Queue::Scan => "collection.scan.*",
            Queue::Thumbnail => "thumbnail.generation.*",
            Queue::Cache => "cache.generation.*",
            Queue::Creation => "collection.creation.*",
            Queue::Bulk => "bulk.operation.*",
            Queue::Processing => "image.processing.*",
        }
    }

    pub fn for_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::CollectionScan => Queue::Scan,
            MessageKind::ThumbnailGeneration => Queue::Thumbnail,
            MessageKind::CacheGeneration => Queue::Cache,
            MessageKind::CollectionCreation => Queue::Creation,
            MessageKind::BulkOperation => Queue::Bulk,
            MessageKind::ImageProcessing => Queue::Processing,
        }
    }

    pub const ALL: [Queue; 6] = [
        Queue::Scan,
        Queue::Thumbnail,
        Queue::Cache,
        Queue::Creation,
        Queue::Bulk,
        Queue::Processing,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MessageKind {
    CollectionScan,
    ThumbnailGeneration,
    CacheGeneration,
    ImageProcessing,
    BulkOperation,
    CollectionCreation,
}

/// Wire-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub id: MessageId,
    pub kind: MessageKind,
    pub correlation_id: Option<BackgroundJobId>,
    pub timestamp: DateTime<Utc>,
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(kind: MessageKind, correlation_id: Option<BackgroundJobId>, payload: P) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            correlation_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionScanMessage {
    pub collection_id: CollectionId,
    pub path: String,
    pub kind: crate::library::CollectionKind,
    #[serde(default)]
    pub force_rescan: bool,
}

/// Shared payload shape for thumbnail/cache/image-processing derivation,
/// using string ids with an optional parent `jobId`, used by all three
/// derivation message kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationMessage {
    pub image_id: ImageId,
    pub collection_id: CollectionId,
    /// `<archivePath>::<entryName>` (canonical) or a plain filesystem path.
    pub source_locator: String,
    pub target_width: u32,
    pub target_height: u32,
    pub quality: u8,
    #[serde(default)]
    pub force_regenerate: bool,
    pub job_id: Option<BackgroundJobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCreationMessage {
    pub library_id: crate::ids::LibraryId,
    pub path: String,
    pub kind: crate::library::CollectionKind,
    pub job_id: Option<BackgroundJobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperationMessage {
    pub operation: String,
    pub collection_ids: Vec<CollectionId>,
    pub job_id: Option<BackgroundJobId>,
}

/// Normalizes an archive entry locator to the canonical `::` separator,
/// accepting the legacy `#` form on read.
pub fn normalize_locator(locator: &str) -> String {
    if locator.contains("::") {
        return locator.to_string();
    }
    if let Some(idx) = locator.rfind('#') {
        let (archive, entry) = locator.split_at(idx);
        return format!("{archive}::{}", &entry[1..]);
    }
    locator.to_string()
}
