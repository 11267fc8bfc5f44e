/// Face bounding box in source-image pixel coordinates, as produced by a
/// detector. May extend past the image edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer rectangle fully inside an image: `0 <= x1 < x2 <= width`,
/// `0 <= y1 < y2 <= height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() * self.height();
        let area_b = other.width() * other.height();
        inter / (area_a + area_b - inter)
    }

    /// Truncates coordinates toward zero, then clamps the top-left corner to
    /// `>= 0` and the bottom-right corner to the image size.
    ///
    /// Returns `None` when the clamped region has zero area.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let x1 = (self.x1 as i64).max(0);
        let y1 = (self.y1 as i64).max(0);
        let x2 = (self.x2 as i64).min(width as i64);
        let y2 = (self.y2 as i64).min(height as i64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x1: x1 as u32,
            y1: y1 as u32,
            x2: x2 as u32,
            y2: y2 as u32,
        })
    }
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}
