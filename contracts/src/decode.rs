use crate::errors::DecodeError;
use catalog_model::Dimensions;

#[derive(Debug, Clone, Copy)]
pub struct ProbedImage {
    pub width: u32,
    pub height: u32,
}

/// Decodes a byte stream into `(width, height, format)` and produces a
/// resized/recompressed output at target dimensions and quality. CPU-bound;
/// callers run it via `tokio::task::spawn_blocking` / `rayon` rather than
/// on an async task directly.
pub trait ImageDecoder: Send + Sync {
    /// Cheap dimension probe on a bounded byte sample, without a full decode.
    fn probe(&self, bytes: &[u8]) -> Result<(ProbedImage, String), DecodeError>;

    /// Full decode, EXIF-orientation normalization, fit-inside resize to
    /// `target`, sRGB color-profile strip, and re-encode at `quality`.
    fn resize(
        &self,
        bytes: &[u8],
        target: Dimensions,
        quality: u8,
    ) -> Result<Vec<u8>, DecodeError>;
}
