use crate::errors::ArchiveError;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub uncompressed_size: u64,
}

/// Streaming read of entries from ZIP/7Z/RAR/TAR. One implementation per
/// archive kind, selected by `Collection.kind`.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Entries in directory-declared order: within an archive, entry
    /// ordering follows how the archive itself declares its entries.
    async fn list_entries(&self, archive_path: &str) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Reads one entry's full contents. Images are bounded in size, so
    /// whole-buffer reads (rather than an `AsyncRead`) keep every backend
    /// — including the synchronous `zip`/`sevenz-rust`/`unrar` crates —
    /// behind the same trait without forcing them onto worker threads
    /// individually at the call site.
    async fn read_entry(&self, archive_path: &str, entry_name: &str) -> Result<Bytes, ArchiveError>;
}
