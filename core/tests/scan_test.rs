//! Scanner reconciliation against a real folder on disk: discovering new
//! images and marking vanished ones as deleted.

mod support;

use catalog_contracts::MessageBus;
use catalog_model::{Collection, CollectionKind, CollectionStats, Library, Queue};
use catalog_core::{DispatchingArchiveReader, ImageCrateDecoder, Scanner};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use support::{InMemoryCatalogStore, InMemoryMessageBus};

fn write_png(path: &std::path::Path, width: u32, height: u32) {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
    std::fs::write(path, out).unwrap();
}

fn new_library() -> Library {
    Library {
        id: catalog_model::LibraryId::new(),
        name: "comics".into(),
        root_path: "/tmp".into(),
        watch_enabled: true,
        scan_interval_sec: 3600,
        allowed_formats: vec![],
        excluded_paths: vec![],
        is_deleted: false,
        created_at: chrono::Utc::now(),
    }
}

fn new_collection(library_id: catalog_model::LibraryId, path: String) -> Collection {
    Collection {
        id: catalog_model::CollectionId::new(),
        library_id,
        name: "vol-1".into(),
        path,
        kind: CollectionKind::Folder,
        settings: Default::default(),
        images: vec![],
        stats: CollectionStats::default(),
        is_deleted: false,
        scan_error: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn folder_scan_discovers_new_images_and_emits_derivation_messages() {
    let tempdir = tempfile::tempdir().unwrap();
    write_png(&tempdir.path().join("a.png"), 400, 300);
    write_png(&tempdir.path().join("b.png"), 100, 100);

    let store = Arc::new(InMemoryCatalogStore::new());
    let bus = Arc::new(InMemoryMessageBus::new());
    let library = new_library();
    let collection = new_collection(library.id.clone(), tempdir.path().to_string_lossy().into_owned());
    let collection_id = collection.id.clone();
    store.seed_library(library);
    store.seed_collection(collection);

    let scanner = Scanner::new(
        store.clone(),
        bus.clone(),
        Arc::new(DispatchingArchiveReader::new()),
        Arc::new(ImageCrateDecoder::new()),
        3,
    );

    let ok = scanner
        .scan_collection(&collection_id, &tempdir.path().to_string_lossy(), CollectionKind::Folder, false, None)
        .await
        .unwrap();
    assert!(ok);

    let saved = store.get_collection(&collection_id).await.unwrap().unwrap();
    assert_eq!(saved.stats.total_images, 2);
    assert!(saved.images.iter().all(|img| img.width > 0 && img.height > 0));

    // Both images are new and auto-cache is on by default, so each
    // contributes one thumbnail + one cache derivation message.
    assert_eq!(bus.queue_len(Queue::Thumbnail), 2);
    assert_eq!(bus.queue_len(Queue::Cache), 2);
}

#[tokio::test]
async fn rescan_marks_vanished_entries_deleted_without_removing_them() {
    let tempdir = tempfile::tempdir().unwrap();
    write_png(&tempdir.path().join("a.png"), 400, 300);

    let store = Arc::new(InMemoryCatalogStore::new());
    let bus = Arc::new(InMemoryMessageBus::new());
    let library = new_library();
    let collection = new_collection(library.id.clone(), tempdir.path().to_string_lossy().into_owned());
    let collection_id = collection.id.clone();
    store.seed_collection(collection);

    let scanner = Scanner::new(
        store.clone(),
        bus.clone(),
        Arc::new(DispatchingArchiveReader::new()),
        Arc::new(ImageCrateDecoder::new()),
        3,
    );
    scanner
        .scan_collection(&collection_id, &tempdir.path().to_string_lossy(), CollectionKind::Folder, false, None)
        .await
        .unwrap();

    std::fs::remove_file(tempdir.path().join("a.png")).unwrap();
    scanner
        .scan_collection(&collection_id, &tempdir.path().to_string_lossy(), CollectionKind::Folder, false, None)
        .await
        .unwrap();

    let saved = store.get_collection(&collection_id).await.unwrap().unwrap();
    assert_eq!(saved.images.len(), 1, "vanished entry stays in the catalog, soft-deleted");
    assert!(saved.images[0].is_deleted);
    assert!(saved.images[0].deleted_at.is_some());
    assert_eq!(saved.stats.total_images, 0);
}
