use crate::ids::{CacheRootId, ImageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An image entry embedded in a `Collection`.
///
/// `(collectionId, relativePath)` is unique — enforced by the owning
/// `Collection`'s reconciliation pass, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub filename: String,
    /// Filesystem-relative path, or `archive::entry` for archive members.
    pub relative_path: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Source mtime, used to detect in-place modification during rescans.
    pub source_mtime: Option<DateTime<Utc>>,
    pub thumbnail: Option<Thumbnail>,
    pub cache: Option<CacheEntry>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Image {
    pub fn new(filename: impl Into<String>, relative_path: impl Into<String>, size: u64) -> Self {
        Self {
            id: ImageId::new(),
            filename: filename.into(),
            relative_path: relative_path.into(),
            size,
            width: 0,
            height: 0,
            format: "unknown".to_string(),
            view_count: 0,
            is_deleted: false,
            deleted_at: None,
            source_mtime: None,
            thumbnail: None,
            cache: None,
            metadata: HashMap::new(),
        }
    }

    /// `true` iff `(size, mtime)` still matches what the catalog recorded,
    /// i.e. the scanner does not need to re-derive artifacts for this entry.
    pub fn matches_source(&self, size: u64, mtime: Option<DateTime<Utc>>) -> bool {
        self.size == size && self.source_mtime == mtime
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(at);
    }

    pub fn invalidate_derived(&mut self) {
        if let Some(thumb) = &mut self.thumbnail {
            thumb.valid = false;
        }
        if let Some(cache) = &mut self.cache {
            cache.valid = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scales `self` to fit inside `bound` preserving aspect ratio, never
    /// upscaling past `self`.
    pub fn fit_inside(self, bound: Dimensions) -> Dimensions {
        if self.width == 0 || self.height == 0 {
            return self;
        }
        if self.width <= bound.width && self.height <= bound.height {
            return self;
        }
        let width_ratio = bound.width as f64 / self.width as f64;
        let height_ratio = bound.height as f64 / self.height as f64;
        let ratio = width_ratio.min(height_ratio);
        Dimensions {
            width: ((self.width as f64) * ratio).round().max(1.0) as u32,
            height: ((self.height as f64) * ratio).round().max(1.0) as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub format: String,
    pub quality: u8,
    pub generated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    pub valid: bool,
    pub cache_root_id: CacheRootId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub quality: u8,
    pub generated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub valid: bool,
    pub cache_root_id: CacheRootId,
}
