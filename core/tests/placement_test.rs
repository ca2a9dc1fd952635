//! Cache placement across multiple roots and behavior under capacity
//! pressure.

mod support;

use catalog_contracts::{CachePlacer, PlacementError};
use catalog_model::{CacheRoot, CacheRootId, CollectionId, ImageId};
use catalog_core::FilesystemCachePlacer;
use std::sync::Arc;
use std::time::Duration;
use support::InMemoryCatalogStore;

fn root(name: &str, path: &std::path::Path, priority: i32, current: u64, max: Option<u64>) -> CacheRoot {
    CacheRoot {
        id: CacheRootId::new(),
        name: name.to_string(),
        absolute_path: path.to_string_lossy().into_owned(),
        priority,
        max_bytes: max,
        current_bytes: current,
        file_count: 0,
        active: true,
        version: 0,
    }
}

#[tokio::test]
async fn places_into_the_higher_priority_root_when_both_have_room() {
    let low_dir = tempfile::tempdir().unwrap();
    let high_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryCatalogStore::new());
    store.seed_cache_root(root("low", low_dir.path(), 0, 0, None));
    let high = root("high", high_dir.path(), 10, 0, None);
    let high_id = high.id.clone();
    store.seed_cache_root(high);

    let placer = FilesystemCachePlacer::new(store.clone(), Duration::from_secs(3600));
    let collection_id = CollectionId::new();
    let image_id = ImageId::new();
    let placed = placer
        .place("thumbnail", &collection_id, &image_id, (300, 300), "jpg", vec![1, 2, 3, 4])
        .await
        .unwrap();

    assert_eq!(placed.cache_root_id, high_id);
    assert!(placed.absolute_path.starts_with(&high_dir.path().to_string_lossy().into_owned()));
    assert_eq!(placed.bytes, 4);

    let updated = store.get_cache_root(&high_id).await.unwrap().unwrap();
    assert_eq!(updated.current_bytes, 4);
    assert_eq!(updated.file_count, 1);
    assert_eq!(updated.version, 1, "placement bumps the CAS version");
}

#[tokio::test]
async fn places_into_root_with_more_free_space_when_priorities_tie() {
    let tight_dir = tempfile::tempdir().unwrap();
    let roomy_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryCatalogStore::new());
    store.seed_cache_root(root("tight", tight_dir.path(), 0, 900, Some(1_000)));
    let roomy = root("roomy", roomy_dir.path(), 0, 100, Some(1_000));
    let roomy_id = roomy.id.clone();
    store.seed_cache_root(roomy);

    let placer = FilesystemCachePlacer::new(store.clone(), Duration::from_secs(3600));
    let placed = placer
        .place("cache", &CollectionId::new(), &ImageId::new(), (1920, 1080), "jpg", vec![0; 50])
        .await
        .unwrap();

    assert_eq!(placed.cache_root_id, roomy_id);
}

#[tokio::test]
async fn placement_fails_with_exhausted_when_every_root_is_full_and_nothing_can_be_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryCatalogStore::new());
    // current_bytes already at max_bytes: no room, and the eviction pass
    // re-checks the same root so there is nothing to reclaim.
    store.seed_cache_root(root("full", dir.path(), 0, 1_000, Some(1_000)));

    let placer = FilesystemCachePlacer::new(store.clone(), Duration::from_secs(3600));
    let err = placer
        .place("thumbnail", &CollectionId::new(), &ImageId::new(), (300, 300), "jpg", vec![1, 2, 3])
        .await
        .unwrap_err();

    assert!(matches!(err, PlacementError::Exhausted));
}

#[tokio::test]
async fn audit_reconciles_byte_and_file_counts_against_what_is_really_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::create_dir_all(dir.path().join("thumbnail")).await.unwrap();
    tokio::fs::write(dir.path().join("thumbnail/a.jpg"), vec![0u8; 128]).await.unwrap();
    tokio::fs::write(dir.path().join("thumbnail/b.jpg"), vec![0u8; 256]).await.unwrap();

    let store = Arc::new(InMemoryCatalogStore::new());
    let seeded = root("audited", dir.path(), 0, 0, None);
    let root_id = seeded.id.clone();
    store.seed_cache_root(seeded.clone());

    let placer = FilesystemCachePlacer::new(store.clone(), Duration::from_secs(3600));
    placer.audit_once(&seeded, Duration::from_secs(3600)).await.unwrap();

    let updated = store.get_cache_root(&root_id).await.unwrap().unwrap();
    assert_eq!(updated.current_bytes, 384);
    assert_eq!(updated.file_count, 2);
}
