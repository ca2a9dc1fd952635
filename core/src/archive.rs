//! Archive readers for ZIP, 7Z, RAR, and TAR, plus the two aliases
//! (CBZ = ZIP, CBR = RAR). One backend per [`catalog_model::CollectionKind`],
//! unified behind the `ArchiveReader` trait and dispatched on
//! `Collection.kind`.

use async_trait::async_trait;
use bytes::Bytes;
use catalog_contracts::{ArchiveEntry, ArchiveError, ArchiveReader};
use catalog_model::CollectionKind;
use std::io::Read;
use std::path::Path;

/// Dispatches to a format-specific reader based on `CollectionKind`.
/// Every backend crate here (`zip`, `tar`, `sevenz-rust`, `unrar`) is
/// synchronous, so calls are executed inside `spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchingArchiveReader;

impl DispatchingArchiveReader {
    pub fn new() -> Self {
        Self
    }

    fn kind_for(path: &str) -> CollectionKind {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".cbz") {
            CollectionKind::Cbz
        } else if lower.ends_with(".zip") {
            CollectionKind::Zip
        } else if lower.ends_with(".cbr") {
            CollectionKind::Cbr
        } else if lower.ends_with(".rar") {
            CollectionKind::Rar
        } else if lower.ends_with(".7z") {
            CollectionKind::SevenZ
        } else {
            CollectionKind::Tar
        }
    }
}

#[async_trait]
impl ArchiveReader for DispatchingArchiveReader {
    async fn list_entries(&self, archive_path: &str) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let kind = Self::kind_for(archive_path);
        let path = archive_path.to_string();
        tokio::task::spawn_blocking(move || list_entries_blocking(kind, &path))
            .await
            .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?
    }

    async fn read_entry(&self, archive_path: &str, entry_name: &str) -> Result<Bytes, ArchiveError> {
        let kind = Self::kind_for(archive_path);
        let path = archive_path.to_string();
        let entry = entry_name.to_string();
        tokio::task::spawn_blocking(move || read_entry_blocking(kind, &path, &entry))
            .await
            .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?
    }
}

fn list_entries_blocking(kind: CollectionKind, path: &str) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    match kind {
        CollectionKind::Folder => Err(ArchiveError::CorruptHeader("folder collections have no archive entries".into())),
        CollectionKind::Zip | CollectionKind::Cbz => {
            let file = std::fs::File::open(path)?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let mut entries = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let entry = archive.by_index(i).map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
                if entry.is_dir() {
                    continue;
                }
                entries.push(ArchiveEntry { name: entry.name().to_string(), uncompressed_size: entry.size() });
            }
            Ok(entries)
        }
        CollectionKind::Tar => {
            let file = std::fs::File::open(path)?;
            let mut archive = tar::Archive::new(file);
            let mut entries = Vec::new();
            for entry in archive.entries()? {
                let entry = entry?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let name = entry.path()?.to_string_lossy().into_owned();
                entries.push(ArchiveEntry { name, uncompressed_size: entry.header().size()? });
            }
            Ok(entries)
        }
        CollectionKind::SevenZ => {
            let archive = sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let entries = archive
                .archive()
                .files
                .iter()
                .filter(|f| !f.is_directory())
                .map(|f| ArchiveEntry { name: f.name().to_string(), uncompressed_size: f.size() })
                .collect();
            Ok(entries)
        }
        CollectionKind::Rar | CollectionKind::Cbr => {
            let archive = unrar::Archive::new(path)
                .open_for_listing()
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let mut entries = Vec::new();
            for header in archive {
                let header = header.map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
                if header.is_file() {
                    entries.push(ArchiveEntry {
                        name: header.filename.to_string_lossy().into_owned(),
                        uncompressed_size: header.unpacked_size,
                    });
                }
            }
            Ok(entries)
        }
    }
}

fn read_entry_blocking(kind: CollectionKind, path: &str, entry_name: &str) -> Result<Bytes, ArchiveError> {
    match kind {
        CollectionKind::Folder => Err(ArchiveError::CorruptHeader("folder collections have no archive entries".into())),
        CollectionKind::Zip | CollectionKind::Cbz => {
            let file = std::fs::File::open(path)?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let mut entry = archive
                .by_name(entry_name)
                .map_err(|_| ArchiveError::EntryNotFound(entry_name.to_string()))?;
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            Ok(Bytes::from(buf))
        }
        CollectionKind::Tar => {
            let file = std::fs::File::open(path)?;
            let mut archive = tar::Archive::new(file);
            for entry in archive.entries()? {
                let mut entry = entry?;
                if entry.path()?.to_string_lossy() == entry_name {
                    let mut buf = Vec::new();
                    entry.read_to_end(&mut buf)?;
                    return Ok(Bytes::from(buf));
                }
            }
            Err(ArchiveError::EntryNotFound(entry_name.to_string()))
        }
        CollectionKind::SevenZ => {
            let mut archive = sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let mut found = None;
            archive
                .for_each_entries(|entry, reader| {
                    if entry.name() == entry_name {
                        let mut buf = Vec::new();
                        reader.read_to_end(&mut buf)?;
                        found = Some(buf);
                    }
                    Ok(true)
                })
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            found.map(Bytes::from).ok_or_else(|| ArchiveError::EntryNotFound(entry_name.to_string()))
        }
        CollectionKind::Rar | CollectionKind::Cbr => {
            let archive = unrar::Archive::new(path)
                .open_for_processing()
                .map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
            let mut cursor = Some(archive);
            while let Some(archive) = cursor.take() {
                let Some((header, next)) = archive.read_header().map_err(|e| ArchiveError::CorruptHeader(e.to_string()))? else {
                    break;
                };
                if header.entry().filename.to_string_lossy() == entry_name {
                    let (data, _) = next.read().map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?;
                    return Ok(Bytes::from(data));
                }
                cursor = Some(next.skip().map_err(|e| ArchiveError::CorruptHeader(e.to_string()))?);
            }
            Err(ArchiveError::EntryNotFound(entry_name.to_string()))
        }
    }
}

/// Splits a canonical `<archivePath>::<entryName>` locator, or treats the
/// whole string as a plain filesystem path when there's no separator.
pub fn split_locator(locator: &str) -> (&str, Option<&str>) {
    match locator.split_once("::") {
        Some((archive, entry)) => (archive, Some(entry)),
        None => (locator, None),
    }
}

pub fn is_archive_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("zip") | Some("cbz") | Some("rar") | Some("cbr") | Some("7z") | Some("tar")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_canonical_locator() {
        assert_eq!(split_locator("book.cbz::p01.jpg"), ("book.cbz", Some("p01.jpg")));
    }

    #[test]
    fn plain_path_has_no_entry() {
        assert_eq!(split_locator("/lib/a.jpg"), ("/lib/a.jpg", None));
    }

    #[test]
    fn recognizes_archive_extensions() {
        assert!(is_archive_path(Path::new("/x/book.cbz")));
        assert!(!is_archive_path(Path::new("/x/photo.jpg")));
    }
}
