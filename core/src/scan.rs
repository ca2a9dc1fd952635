//! Collection scanner: enumerates source entries (folder walk or archive
//! central directory), reconciles them against the catalog's `images[]`,
//! and emits derivation messages for new or changed entries.

use crate::archive::DispatchingArchiveReader;
use catalog_contracts::{ArchiveReader, CatalogStore, ImageDecoder, MessageBus};
use catalog_model::{
    normalize_locator, BackgroundJobId, CollectionId, CollectionKind, DerivationMessage, Image,
    MessageKind,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

struct SourceEntry {
    relative_path: String,
    size: u64,
    mtime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Scanner {
    store: Arc<dyn CatalogStore>,
    bus: Arc<dyn MessageBus>,
    archive: Arc<DispatchingArchiveReader>,
    decoder: Arc<dyn ImageDecoder>,
    max_requeue_attempts: u32,
}

impl Scanner {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        bus: Arc<dyn MessageBus>,
        archive: Arc<DispatchingArchiveReader>,
        decoder: Arc<dyn ImageDecoder>,
        max_requeue_attempts: u32,
    ) -> Self {
        Self { store, bus, archive, decoder, max_requeue_attempts }
    }

    /// Enumerates, reconciles, and emits derivation messages for one
    /// collection. Returns `Ok(true)` on success (caller acks), `Ok(false)` when the
    /// collection was missing/deleted (caller ack-drops), and an error
    /// when the caller should nack-requeue up to the configured ceiling.
    pub async fn scan_collection(
        &self,
        collection_id: &CollectionId,
        path: &str,
        kind: CollectionKind,
        force_rescan: bool,
        job_id: Option<BackgroundJobId>,
    ) -> anyhow::Result<bool> {
        let Some(mut collection) = self.store.get_collection(collection_id).await? else {
            return Ok(false);
        };
        if collection.is_deleted {
            return Ok(false);
        }

        let current = match self.enumerate(path, kind).await {
            Ok(entries) => entries,
            Err(e) => {
                collection.scan_error = Some(e.to_string());
                self.store.save_collection(&collection).await?;
                anyhow::bail!("scan of {collection_id} failed: {e}");
            }
        };

        let current_paths: HashSet<&str> = current.iter().map(|e| e.relative_path.as_str()).collect();
        let (thumb_w, thumb_h) = collection.thumbnail_dims();
        let (cache_w, cache_h) = collection.cache_dims();
        let auto_cache = collection.auto_cache_enabled();
        let quality = collection.jpeg_quality();
        let now = Utc::now();

        for entry in &current {
            if let Some(image) = collection.find_image_mut(&entry.relative_path) {
                let changed = force_rescan || !image.matches_source(entry.size, entry.mtime);
                if changed {
                    image.size = entry.size;
                    image.source_mtime = entry.mtime;
                    image.invalidate_derived();
                    self.emit_derivation_messages(
                        collection_id,
                        image,
                        path,
                        kind,
                        (thumb_w, thumb_h),
                        (cache_w, cache_h),
                        auto_cache,
                        quality,
                        force_rescan,
                        job_id.clone(),
                    )
                    .await?;
                }
            } else {
                let mut image = Image::new(
                    Path::new(&entry.relative_path).file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_else(|| entry.relative_path.clone()),
                    entry.relative_path.clone(),
                    entry.size,
                );
                image.source_mtime = entry.mtime;

                let probe_bytes = self.read_probe_bytes(path, kind, &entry.relative_path).await;
                match probe_bytes {
                    Ok(bytes) => match self.decoder.probe(&bytes) {
                        Ok((probed, format)) => {
                            image.width = probed.width;
                            image.height = probed.height;
                            image.format = format;
                        }
                        Err(e) => {
                            warn!(path = %entry.relative_path, error = %e, "decode probe failed, recording unknown dims");
                        }
                    },
                    Err(e) => {
                        warn!(path = %entry.relative_path, error = %e, "could not read entry for probing");
                    }
                }

                collection.images.push(image);
                let image = collection.images.last_mut().unwrap();
                self.emit_derivation_messages(
                    collection_id,
                    image,
                    path,
                    kind,
                    (thumb_w, thumb_h),
                    (cache_w, cache_h),
                    auto_cache,
                    quality,
                    false,
                    job_id.clone(),
                )
                .await?;
            }
        }

        for image in collection.images.iter_mut() {
            if !image.is_deleted && !current_paths.contains(image.relative_path.as_str()) {
                image.mark_deleted(now);
            }
        }

        collection.stats.total_images = collection.images.iter().filter(|i| !i.is_deleted).count() as u64;
        collection.stats.total_size_bytes = collection.images.iter().filter(|i| !i.is_deleted).map(|i| i.size).sum();
        collection.stats.last_scanned_at = Some(now);
        collection.scan_error = None;

        self.store.save_collection(&collection).await?;
        info!(collection = %collection_id, images = collection.stats.total_images, "scan reconciled");
        Ok(true)
    }

    async fn enumerate(&self, path: &str, kind: CollectionKind) -> anyhow::Result<Vec<SourceEntry>> {
        if kind == CollectionKind::Folder {
            return self.enumerate_folder(path).await;
        }
        self.enumerate_archive(path).await
    }

    async fn enumerate_folder(&self, root: &str) -> anyhow::Result<Vec<SourceEntry>> {
        let root = root.to_string();
        tokio::task::spawn_blocking(move || {
            let mut entries: Vec<SourceEntry> = WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    let meta = e.metadata().ok()?;
                    let relative = e.path().strip_prefix(&root).ok()?.to_string_lossy().into_owned();
                    let mtime = meta.modified().ok().map(DateTime::<Utc>::from);
                    Some(SourceEntry { relative_path: relative, size: meta.len(), mtime })
                })
                .collect();
            entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
            Ok(entries)
        })
        .await?
    }

    async fn enumerate_archive(&self, archive_path: &str) -> anyhow::Result<Vec<SourceEntry>> {
        let entries = self.archive.list_entries(archive_path).await?;
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            // directory-declared order preserved; first occurrence of a
            // duplicate name wins.
            if !seen.insert(entry.name.clone()) {
                warn!(entry = %entry.name, archive = archive_path, "duplicate entry name in archive, keeping first");
                continue;
            }
            out.push(SourceEntry { relative_path: entry.name, size: entry.uncompressed_size, mtime: None });
        }
        Ok(out)
    }

    fn locator_for(path: &str, kind: CollectionKind, relative_path: &str) -> String {
        if kind == CollectionKind::Folder {
            Path::new(path).join(relative_path).to_string_lossy().into_owned()
        } else {
            format!("{path}::{relative_path}")
        }
    }

    async fn read_probe_bytes(&self, path: &str, kind: CollectionKind, relative_path: &str) -> anyhow::Result<Vec<u8>> {
        if kind == CollectionKind::Folder {
            let full = Path::new(path).join(relative_path);
            Ok(tokio::fs::read(full).await?)
        } else {
            Ok(self.archive.read_entry(path, relative_path).await?.to_vec())
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_derivation_messages(
        &self,
        collection_id: &CollectionId,
        image: &Image,
        path: &str,
        kind: CollectionKind,
        thumb_dims: (u32, u32),
        cache_dims: (u32, u32),
        auto_cache: bool,
        quality: u8,
        force_regenerate: bool,
        job_id: Option<BackgroundJobId>,
    ) -> anyhow::Result<()> {
        if image.width == 0 || image.height == 0 {
            // Per-entry decode failure: record and skip derivation until next scan.
            return Ok(());
        }
        let locator = normalize_locator(&Self::locator_for(path, kind, &image.relative_path));

        let thumbnail_msg = DerivationMessage {
            image_id: image.id.clone(),
            collection_id: collection_id.clone(),
            source_locator: locator.clone(),
            target_width: thumb_dims.0,
            target_height: thumb_dims.1,
            quality,
            force_regenerate,
            job_id: job_id.clone(),
        };
        self.bus
            .publish(MessageKind::ThumbnailGeneration, job_id.clone(), serde_json::to_value(&thumbnail_msg)?)
            .await?;

        if auto_cache {
            let cache_msg = DerivationMessage {
                image_id: image.id.clone(),
                collection_id: collection_id.clone(),
                source_locator: locator,
                target_width: cache_dims.0,
                target_height: cache_dims.1,
                quality,
                force_regenerate,
                job_id: job_id.clone(),
            };
            self.bus
                .publish(MessageKind::CacheGeneration, job_id, serde_json::to_value(&cache_msg)?)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_for_folder_joins_path() {
        let locator = Scanner::locator_for("/lib/books", CollectionKind::Folder, "sub/a.jpg");
        assert_eq!(locator, "/lib/books/sub/a.jpg");
    }

    #[test]
    fn locator_for_archive_uses_double_colon() {
        let locator = Scanner::locator_for("/lib/book.cbz", CollectionKind::Cbz, "p01.jpg");
        assert_eq!(locator, "/lib/book.cbz::p01.jpg");
    }
}
