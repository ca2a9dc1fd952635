//! `ImageDecoder` backed by the `image` crate for decode/resize/encode and
//! `kamadak-exif` for orientation normalization. Pure CPU-bound work;
//! callers dispatch through `spawn_blocking`.

use catalog_contracts::{DecodeError, ImageDecoder, ProbedImage};
use catalog_model::Dimensions;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }

    fn exif_orientation(bytes: &[u8]) -> u32 {
        let mut cursor = Cursor::new(bytes);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
            return 1;
        };
        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            .unwrap_or(1)
    }

    /// Applies the EXIF orientation tag (1-8) as physical transforms, per
    /// the standard EXIF orientation table.
    fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
        match orientation {
            2 => img.fliph(),
            3 => img.rotate180(),
            4 => img.flipv(),
            5 => img.rotate90().fliph(),
            6 => img.rotate90(),
            7 => img.rotate270().fliph(),
            8 => img.rotate270(),
            _ => img,
        }
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn probe(&self, bytes: &[u8]) -> Result<(ProbedImage, String), DecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Decode(e.to_string()))?;
        let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| DecodeError::Decode(e.to_string()))?;
        Ok((ProbedImage { width, height }, format_name(format)))
    }

    fn resize(&self, bytes: &[u8], target: Dimensions, quality: u8) -> Result<Vec<u8>, DecodeError> {
        let orientation = Self::exif_orientation(bytes);

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Decode(e.to_string()))?;
        let img = reader.decode().map_err(|e| DecodeError::Decode(e.to_string()))?;
        let img = Self::apply_orientation(img, orientation);

        let source_dims = Dimensions::new(img.width(), img.height());
        let fitted = source_dims.fit_inside(target);
        let resized = if fitted.width == img.width() && fitted.height == img.height() {
            img
        } else {
            img.resize(fitted.width, fitted.height, image::imageops::FilterType::Lanczos3)
        };

        // `image`'s RGBA8/RGB8 buffers are already sRGB; dropping any
        // embedded ICC profile during re-encode strips the color profile.
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode_image(&rgb)
            .map_err(|e| DecodeError::Decode(e.to_string()))?;
        Ok(out)
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(40, 20));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn probe_reports_dimensions_and_format() {
        let decoder = ImageCrateDecoder::new();
        let (probed, format) = decoder.probe(&tiny_png()).unwrap();
        assert_eq!((probed.width, probed.height), (40, 20));
        assert_eq!(format, "png");
    }

    #[test]
    fn resize_fits_inside_target_box() {
        let decoder = ImageCrateDecoder::new();
        let out = decoder.resize(&tiny_png(), Dimensions::new(10, 10), 85).unwrap();
        let (probed, _) = decoder.probe(&out).unwrap();
        assert!(probed.width <= 10 && probed.height <= 10);
    }

    #[test]
    fn orientation_1_is_identity() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 2));
        let out = ImageCrateDecoder::apply_orientation(img.clone(), 1);
        assert_eq!((out.width(), out.height()), (img.width(), img.height()));
    }
}
