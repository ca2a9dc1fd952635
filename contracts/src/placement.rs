use crate::errors::PlacementError;
use async_trait::async_trait;
use catalog_model::{CacheRootId, CollectionId, ImageId};

#[derive(Debug, Clone)]
pub struct PlacedArtifact {
    pub absolute_path: String,
    pub cache_root_id: CacheRootId,
    pub bytes: u64,
}

/// Selects a `CacheRoot`, writes the artifact atomically, and updates the
/// root's byte/file accounting.
#[async_trait]
pub trait CachePlacer: Send + Sync {
    async fn place(
        &self,
        kind: &str,
        collection_id: &CollectionId,
        image_id: &ImageId,
        dims: (u32, u32),
        ext: &str,
        bytes: Vec<u8>,
    ) -> Result<PlacedArtifact, PlacementError>;
}
