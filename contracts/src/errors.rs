use catalog_model::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("optimistic concurrency conflict on {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::NotFound(_) => ErrorKind::InvalidInput,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CatalogError::Storage(_) => ErrorKind::TransientIo,
        }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("queue is full")]
    QueueFull,
    #[error("message not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusError::QueueFull => ErrorKind::ResourceExhausted,
            BusError::NotFound(_) => ErrorKind::InvalidInput,
            BusError::Transport(_) => ErrorKind::TransientIo,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive header is corrupt or truncated: {0}")]
    CorruptHeader(String),
    #[error("entry not found: {0}")]
    EntryNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::CorruptHeader(_) => ErrorKind::InvalidInput,
            ArchiveError::EntryNotFound(_) => ErrorKind::InvalidInput,
            ArchiveError::Io(_) => ErrorKind::TransientIo,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("decode failed: {0}")]
    Decode(String),
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("no cache root with sufficient space even after eviction")]
    Exhausted,
    #[error("no active cache root configured")]
    NoActiveRoot,
    #[error("I/O error writing artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl PlacementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlacementError::Exhausted => ErrorKind::ResourceExhausted,
            PlacementError::NoActiveRoot => ErrorKind::ResourceExhausted,
            PlacementError::Io(_) => ErrorKind::TransientIo,
        }
    }
}
