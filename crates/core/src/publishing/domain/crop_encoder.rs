use crate::publishing::domain::blob_publisher::PublishError;
use crate::shared::pixel_grid::PixelGrid;

/// A crop compressed for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Compresses a crop into an uploadable image format.
pub trait CropEncoder: Send + Sync {
    fn encode(&self, pixels: &PixelGrid) -> Result<EncodedImage, PublishError>;
}
