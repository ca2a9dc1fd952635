//! Scanner reconciliation against a real ZIP/CBZ archive and
//! corrupt-archive handling.

mod support;

use catalog_contracts::{ArchiveReader, MessageBus};
use catalog_model::{Collection, CollectionKind, CollectionStats, Queue};
use catalog_core::{DispatchingArchiveReader, ImageCrateDecoder, Scanner};
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::sync::Arc;
use support::{InMemoryCatalogStore, InMemoryMessageBus};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
    out
}

fn build_cbz(path: &std::path::Path, entries: &[(&str, Vec<u8>)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn new_collection(path: String, kind: CollectionKind) -> Collection {
    Collection {
        id: catalog_model::CollectionId::new(),
        library_id: catalog_model::LibraryId::new(),
        name: "vol-1".into(),
        path,
        kind,
        settings: Default::default(),
        images: vec![],
        stats: CollectionStats::default(),
        is_deleted: false,
        scan_error: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn zip_scan_reconciles_entries_in_directory_order() {
    let tempdir = tempfile::tempdir().unwrap();
    let archive_path = tempdir.path().join("vol1.cbz");
    build_cbz(
        &archive_path,
        &[("p01.png", png_bytes(600, 800)), ("p02.png", png_bytes(600, 800))],
    );

    let store = Arc::new(InMemoryCatalogStore::new());
    let bus = Arc::new(InMemoryMessageBus::new());
    let collection = new_collection(archive_path.to_string_lossy().into_owned(), CollectionKind::Cbz);
    let collection_id = collection.id.clone();
    store.seed_collection(collection);

    let scanner = Scanner::new(
        store.clone(),
        bus.clone(),
        Arc::new(DispatchingArchiveReader::new()),
        Arc::new(ImageCrateDecoder::new()),
        3,
    );

    let ok = scanner
        .scan_collection(&collection_id, &archive_path.to_string_lossy(), CollectionKind::Cbz, false, None)
        .await
        .unwrap();
    assert!(ok);

    let saved = store.get_collection(&collection_id).await.unwrap().unwrap();
    assert_eq!(saved.stats.total_images, 2);
    assert_eq!(saved.images[0].relative_path, "p01.png");
    assert_eq!(saved.images[1].relative_path, "p02.png");
    assert_eq!(bus.queue_len(Queue::Thumbnail), 2);
}

#[tokio::test]
async fn corrupt_archive_is_reported_as_a_scan_error_not_a_panic() {
    let tempdir = tempfile::tempdir().unwrap();
    let bogus = tempdir.path().join("broken.cbz");
    std::fs::write(&bogus, b"this is not a zip file").unwrap();

    let store = Arc::new(InMemoryCatalogStore::new());
    let bus = Arc::new(InMemoryMessageBus::new());
    let collection = new_collection(bogus.to_string_lossy().into_owned(), CollectionKind::Cbz);
    let collection_id = collection.id.clone();
    store.seed_collection(collection);

    let scanner = Scanner::new(
        store.clone(),
        bus.clone(),
        Arc::new(DispatchingArchiveReader::new()),
        Arc::new(ImageCrateDecoder::new()),
        3,
    );

    let result = scanner
        .scan_collection(&collection_id, &bogus.to_string_lossy(), CollectionKind::Cbz, false, None)
        .await;
    assert!(result.is_err(), "corrupt archive should surface as an error the caller nack-requeues");

    let saved = store.get_collection(&collection_id).await.unwrap().unwrap();
    assert!(saved.scan_error.is_some());
}

#[tokio::test]
async fn reading_missing_entry_from_archive_returns_entry_not_found() {
    let tempdir = tempfile::tempdir().unwrap();
    let archive_path = tempdir.path().join("vol1.cbz");
    build_cbz(&archive_path, &[("p01.png", png_bytes(10, 10))]);

    let reader = DispatchingArchiveReader::new();
    let err = reader
        .read_entry(&archive_path.to_string_lossy(), "does-not-exist.png")
        .await
        .unwrap_err();
    assert!(matches!(err, catalog_contracts::ArchiveError::EntryNotFound(_)));
}
