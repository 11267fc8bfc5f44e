use ndarray::s;

use crate::shared::bounding_box::{BoundingBox, PixelRect};
use crate::shared::pixel_grid::PixelGrid;

/// Rectangular slice of a source image. Always non-empty.
///
/// No rotation, alignment or resizing: the pixels are exactly the source
/// pixels inside `rect`.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceCrop {
    pub rect: PixelRect,
    pub pixels: PixelGrid,
}

/// Extracts the region under `bbox`, clamped to the image.
///
/// `None` means the clamped region has zero area and the detection should
/// be skipped rather than failing the request.
pub fn extract(grid: &PixelGrid, bbox: &BoundingBox) -> Option<FaceCrop> {
    let rect = bbox.clamp_to(grid.width(), grid.height())?;
    let view = grid.as_ndarray();
    let region = view.slice(s![
        rect.y1 as usize..rect.y2 as usize,
        rect.x1 as usize..rect.x2 as usize,
        ..
    ]);
    let data: Vec<u8> = region.iter().copied().collect();
    Some(FaceCrop {
        rect,
        pixels: PixelGrid::new(data, rect.width(), rect.height()),
    })
}
