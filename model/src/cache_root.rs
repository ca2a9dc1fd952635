use crate::ids::CacheRootId;
use serde::{Deserialize, Serialize};

/// A configured directory on local storage that holds derivation artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRoot {
    pub id: CacheRootId,
    pub name: String,
    pub absolute_path: String,
    /// Higher wins during placement.
    pub priority: i32,
    /// `None` means unlimited.
    pub max_bytes: Option<u64>,
    pub current_bytes: u64,
    pub file_count: u64,
    pub active: bool,
    /// Optimistic-concurrency token for `currentBytes`/`fileCount` updates.
    pub version: i64,
}

impl CacheRoot {
    pub fn free_bytes(&self) -> Option<u64> {
        self.max_bytes.map(|max| max.saturating_sub(self.current_bytes))
    }

    pub fn has_room_for(&self, size: u64) -> bool {
        match self.max_bytes {
            None => true,
            Some(max) => self.current_bytes.saturating_add(size) <= max,
        }
    }
}

/// Result of validating a candidate cache-root path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PathValidation {
    pub valid: bool,
    pub exists: bool,
    pub writable: bool,
    pub is_directory: bool,
    pub free_bytes: Option<u64>,
}
