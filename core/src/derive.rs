//! Derivation workers: three consumer pools (thumbnail, cache,
//! image-processing) sharing one handler that decodes a source image,
//! resizes it, places the artifact, and updates the owning
//! `Collection`'s embedded `Image`.
//!
//! Concurrency guard: derivation is keyed by `(imageId, kind, targetDims)`
//! via an in-process lock map, guarding mutable in-flight state behind a
//! concurrent map rather than a single global mutex.

use catalog_contracts::{ArchiveReader, CachePlacer, CatalogStore, ImageDecoder};
use catalog_model::{
    BackgroundJob, CacheEntry, Collection, DerivationMessage, Dimensions, HandlerOutcome, Thumbnail,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationKind {
    Thumbnail,
    Cache,
    Processing,
}

impl DerivationKind {
    fn extension(self) -> &'static str {
        "jpg"
    }
}

type LockKey = (String, DerivationKind, u32, u32);

#[derive(Debug, Clone)]
pub struct DerivationHandler {
    store: Arc<dyn CatalogStore>,
    archive: Arc<dyn ArchiveReader>,
    decoder: Arc<dyn ImageDecoder>,
    placer: Arc<dyn CachePlacer>,
    in_flight: Arc<DashMap<LockKey, ()>>,
}

impl DerivationHandler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        archive: Arc<dyn ArchiveReader>,
        decoder: Arc<dyn ImageDecoder>,
        placer: Arc<dyn CachePlacer>,
    ) -> Self {
        Self { store, archive, decoder, placer, in_flight: Arc::new(DashMap::new()) }
    }

    /// Processes one `DerivationMessage` for the given pool, returning the
    /// disposition the caller should ack/nack with.
    pub async fn handle(&self, kind: DerivationKind, msg: &DerivationMessage) -> HandlerOutcome {
        let key: LockKey = (msg.image_id.as_str().to_string(), kind, msg.target_width, msg.target_height);
        if self.in_flight.contains_key(&key) {
            // Same (image, kind, dims) already being derived by another
            // worker in this process; the redelivery will be re-evaluated
            // once that worker's ack lands and the source state settles.
            return HandlerOutcome::NackRequeue;
        }
        self.in_flight.insert(key.clone(), ());
        let outcome = self.handle_locked(kind, msg).await;
        self.in_flight.remove(&key);
        outcome
    }

    async fn handle_locked(&self, kind: DerivationKind, msg: &DerivationMessage) -> HandlerOutcome {
        let collection = match self.store.get_collection(&msg.collection_id).await {
            Ok(Some(c)) => c,
            Ok(None) => return HandlerOutcome::NackDrop,
            Err(e) => {
                error!(error = %e, "failed to load collection for derivation");
                return HandlerOutcome::NackRequeue;
            }
        };

        let Some(image) = collection.images.iter().find(|i| i.id == msg.image_id) else {
            return HandlerOutcome::NackDrop;
        };

        let target = Dimensions::new(msg.target_width, msg.target_height);
        if !msg.force_regenerate {
            let already_done = match kind {
                DerivationKind::Thumbnail => image
                    .thumbnail
                    .as_ref()
                    .is_some_and(|t| t.valid && t.width == target.width && t.height == target.height),
                DerivationKind::Cache | DerivationKind::Processing => image
                    .cache
                    .as_ref()
                    .is_some_and(|c| c.valid && c.width == target.width && c.height == target.height),
            };
            if already_done {
                return HandlerOutcome::Ack;
            }
        }

        let bytes = match self.read_source(&msg.source_locator).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(locator = %msg.source_locator, error = %e, "could not read source for derivation");
                return HandlerOutcome::NackRequeue;
            }
        };

        let resized = match self.decoder.resize(&bytes, target, msg.quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(image = %msg.image_id, error = %e, "decode failed, marking derived artifact invalid");
                return self.mark_invalid_and_fail(&collection, msg, kind).await;
            }
        };

        let placed = match self
            .placer
            .place(pool_name(kind), &msg.collection_id, &msg.image_id, (target.width, target.height), kind.extension(), resized.clone())
            .await
        {
            Ok(placed) => placed,
            Err(e) => {
                warn!(image = %msg.image_id, error = %e, "cache placement failed");
                return HandlerOutcome::NackRequeue;
            }
        };

        if let Err(e) = self.apply_artifact(&msg.collection_id, &msg.image_id, kind, target, msg.quality, &placed).await {
            error!(error = %e, "failed to persist derived artifact onto collection");
            return HandlerOutcome::NackRequeue;
        }

        if let Some(job_id) = &msg.job_id {
            if let Err(e) = self.bump_job_done(job_id).await {
                warn!(job = %job_id, error = %e, "failed to increment background job progress");
            }
        }

        HandlerOutcome::Ack
    }

    async fn read_source(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        match locator.split_once("::") {
            Some((archive_path, entry_name)) => Ok(self.archive.read_entry(archive_path, entry_name).await?.to_vec()),
            None => Ok(tokio::fs::read(locator).await?),
        }
    }

    async fn mark_invalid_and_fail(
        &self,
        collection: &Collection,
        msg: &DerivationMessage,
        kind: DerivationKind,
    ) -> HandlerOutcome {
        let mut updated = collection.clone();
        if let Some(image) = updated.images.iter_mut().find(|i| i.id == msg.image_id) {
            match kind {
                DerivationKind::Thumbnail => {
                    if let Some(t) = &mut image.thumbnail {
                        t.valid = false;
                    }
                }
                DerivationKind::Cache | DerivationKind::Processing => {
                    if let Some(c) = &mut image.cache {
                        c.valid = false;
                    }
                }
            }
        }
        if let Err(e) = self.store.save_collection(&updated).await {
            error!(error = %e, "failed to persist invalidated artifact state");
        }
        if let Some(job_id) = &msg.job_id {
            if let Err(e) = self.bump_job_failed(job_id).await {
                warn!(job = %job_id, error = %e, "failed to increment background job failure count");
            }
        }
        HandlerOutcome::NackDrop
    }

    async fn apply_artifact(
        &self,
        collection_id: &catalog_model::CollectionId,
        image_id: &catalog_model::ImageId,
        kind: DerivationKind,
        target: Dimensions,
        quality: u8,
        placed: &catalog_contracts::PlacedArtifact,
    ) -> anyhow::Result<()> {
        let Some(mut collection) = self.store.get_collection(collection_id).await? else {
            return Ok(());
        };
        let Some(image) = collection.images.iter_mut().find(|i| &i.id == image_id) else {
            return Ok(());
        };
        let now = chrono::Utc::now();
        match kind {
            DerivationKind::Thumbnail => {
                image.thumbnail = Some(Thumbnail {
                    path: placed.absolute_path.clone(),
                    width: target.width,
                    height: target.height,
                    bytes: placed.bytes,
                    format: "jpeg".to_string(),
                    quality,
                    generated_at: now,
                    last_accessed_at: now,
                    access_count: 0,
                    valid: true,
                    cache_root_id: placed.cache_root_id.clone(),
                });
            }
            DerivationKind::Cache | DerivationKind::Processing => {
                image.cache = Some(CacheEntry {
                    path: placed.absolute_path.clone(),
                    width: target.width,
                    height: target.height,
                    bytes: placed.bytes,
                    quality,
                    generated_at: now,
                    last_accessed_at: now,
                    valid: true,
                    cache_root_id: placed.cache_root_id.clone(),
                });
            }
        }
        self.store.save_collection(&collection).await?;
        Ok(())
    }

    async fn bump_job_done(&self, job_id: &catalog_model::BackgroundJobId) -> anyhow::Result<()> {
        self.mutate_job(job_id, BackgroundJob::record_success).await
    }

    async fn bump_job_failed(&self, job_id: &catalog_model::BackgroundJobId) -> anyhow::Result<()> {
        self.mutate_job(job_id, |job| job.record_failure("derivation failed")).await
    }

    async fn mutate_job(
        &self,
        job_id: &catalog_model::BackgroundJobId,
        f: impl FnOnce(&mut BackgroundJob),
    ) -> anyhow::Result<()> {
        if let Some(mut job) = self.store.get_background_job(job_id).await? {
            f(&mut job);
            self.store.update_background_job(&job).await?;
        }
        Ok(())
    }
}

fn pool_name(kind: DerivationKind) -> &'static str {
    match kind {
        DerivationKind::Thumbnail => "thumbnail",
        DerivationKind::Cache => "cache",
        DerivationKind::Processing => "processing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_name_matches_derivation_kind() {
        assert_eq!(pool_name(DerivationKind::Thumbnail), "thumbnail");
        assert_eq!(pool_name(DerivationKind::Cache), "cache");
        assert_eq!(pool_name(DerivationKind::Processing), "processing");
    }
}
