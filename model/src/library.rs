use crate::ids::{CollectionId, LibraryId};
use crate::image::Image;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub root_path: String,
    #[serde(default = "default_true")]
    pub watch_enabled: bool,
    pub scan_interval_sec: u64,
    #[serde(default)]
    pub allowed_formats: Vec<String>,
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Folder,
    Zip,
    #[serde(rename = "7z")]
    SevenZ,
    Rar,
    Tar,
    Cbz,
    Cbr,
}

impl CollectionKind {
    pub fn is_archive(self) -> bool {
        !matches!(self, CollectionKind::Folder)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_images: u64,
    pub total_size_bytes: u64,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

/// A unit of browsing: either a folder of images or a single archive file.
///
/// Embedded `images` favors single-document reads for libraries under
/// `MAX_EMBEDDED_IMAGES`; the Postgres-backed catalog store paginates
/// reads past that threshold out of a child table instead of changing
/// this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub library_id: LibraryId,
    pub name: String,
    pub path: String,
    pub kind: CollectionKind,
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub stats: CollectionStats,
    #[serde(default)]
    pub is_deleted: bool,
    pub scan_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cap past which the catalog store moves `images` into a paginated child
/// table rather than a single embedded JSON document.
pub const MAX_EMBEDDED_IMAGES: usize = 2_000;

impl Collection {
    pub fn thumbnail_dims(&self) -> (u32, u32) {
        read_dims(&self.settings, "thumbnailWidth", "thumbnailHeight", (300, 300))
    }

    pub fn cache_dims(&self) -> (u32, u32) {
        read_dims(&self.settings, "cacheWidth", "cacheHeight", (1920, 1080))
    }

    pub fn auto_cache_enabled(&self) -> bool {
        self.settings
            .get("autoGenerateCache")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.settings
            .get("jpegQuality")
            .and_then(|v| v.as_u64())
            .map(|q| q.clamp(1, 100) as u8)
            .unwrap_or(85)
    }

    pub fn find_image_mut(&mut self, relative_path: &str) -> Option<&mut Image> {
        self.images
            .iter_mut()
            .find(|img| img.relative_path == relative_path)
    }
}

fn read_dims(
    settings: &HashMap<String, serde_json::Value>,
    width_key: &str,
    height_key: &str,
    default: (u32, u32),
) -> (u32, u32) {
    let width = settings
        .get(width_key)
        .and_then(|v| v.as_u64())
        .map(|w| w as u32)
        .unwrap_or(default.0);
    let height = settings
        .get(height_key)
        .and_then(|v| v.as_u64())
        .map(|h| h as u32)
        .unwrap_or(default.1);
    (width, height)
}
