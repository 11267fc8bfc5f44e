use thiserror::Error;

use crate::shared::pixel_grid::PixelGrid;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Could not decode the image: {0}")]
    Malformed(String),
    #[error("Could not decode the image: decoded image is empty")]
    Empty,
}

/// Turns uploaded bytes into an RGB pixel grid.
///
/// The encoded format is sniffed from the bytes; the declared content-type
/// is never consulted here.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid, DecodeError>;
}
