use std::io::Cursor;

use image::{DynamicImage, ImageDecoder as _, ImageReader};

use crate::decoding::domain::image_decoder::{DecodeError, ImageDecoder};
use crate::shared::pixel_grid::PixelGrid;

/// Decodes any raster format the `image` crate supports (JPEG, PNG, WebP,
/// BMP, TIFF, ...) and applies EXIF orientation so the grid matches what a
/// viewer shows.
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let malformed = |e: image::ImageError| DecodeError::Malformed(e.to_string());

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let mut decoder = reader.into_decoder().map_err(malformed)?;
        let orientation = decoder.orientation().map_err(malformed)?;
        let mut img = DynamicImage::from_decoder(decoder).map_err(malformed)?;
        img.apply_orientation(orientation);

        let rgb = img.into_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }
        Ok(PixelGrid::new(rgb.into_raw(), width, height))
    }
}
