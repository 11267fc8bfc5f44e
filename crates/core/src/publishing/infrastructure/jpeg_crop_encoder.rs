use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::publishing::domain::blob_publisher::PublishError;
use crate::publishing::domain::crop_encoder::{CropEncoder, EncodedImage};
use crate::shared::constants::JPEG_QUALITY;
use crate::shared::pixel_grid::PixelGrid;

/// Encodes crops as baseline JPEG using the `image` crate.
pub struct JpegCropEncoder {
    quality: u8,
}

impl JpegCropEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegCropEncoder {
    fn default() -> Self {
        Self::new(JPEG_QUALITY)
    }
}

impl CropEncoder for JpegCropEncoder {
    fn encode(&self, pixels: &PixelGrid) -> Result<EncodedImage, PublishError> {
        if pixels.is_empty() {
            return Err(PublishError::Encode("crop is empty".into()));
        }
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(
                pixels.data(),
                pixels.width(),
                pixels.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        Ok(EncodedImage {
            bytes,
            content_type: "image/jpeg",
            extension: "jpg",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> PixelGrid {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        PixelGrid::new(data, width, height)
    }

    #[test]
    fn test_encodes_decodable_jpeg() {
        let encoded = JpegCropEncoder::default()
            .encode(&solid(30, 20, [50, 100, 200]))
            .unwrap();
        assert_eq!(encoded.content_type, "image/jpeg");
        assert_eq!(encoded.extension, "jpg");
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]); // SOI marker

        let img = image::load_from_memory(&encoded.bytes).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (30, 20));
        let px = img.get_pixel(15, 10).0;
        // Lossy: allow a little drift on a flat colour
        assert!(px.iter().zip([50u8, 100, 200]).all(|(a, b)| a.abs_diff(b) <= 4));
    }

    #[test]
    fn test_single_pixel_crop() {
        assert!(JpegCropEncoder::default()
            .encode(&solid(1, 1, [0, 0, 0]))
            .is_ok());
    }

    #[test]
    fn test_empty_crop_rejected() {
        let result = JpegCropEncoder::default().encode(&PixelGrid::new(Vec::new(), 0, 0));
        assert!(matches!(result, Err(PublishError::Encode(_))));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        // Noisy content so quality actually matters
        let data: Vec<u8> = (0..64 * 64 * 3).map(|i| ((i * 37) % 251) as u8).collect();
        let grid = PixelGrid::new(data, 64, 64);
        let high = JpegCropEncoder::new(95).encode(&grid).unwrap();
        let low = JpegCropEncoder::new(20).encode(&grid).unwrap();
        assert!(low.bytes.len() < high.bytes.len());
    }
}
