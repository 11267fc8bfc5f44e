//! Shared math utilities for detection infrastructure.
//!
//! Greedy NMS for detector output, and the 2D similarity transform plus
//! bilinear sampling used to align faces before embedding.

use crate::shared::bounding_box::BoundingBox;
use crate::shared::pixel_grid::PixelGrid;

/// Greedy NMS: sort by score descending, suppress boxes whose IoU with an
/// already-kept box exceeds `iou_thresh`. Returns kept indices in score order.
pub fn nms(boxes: &[BoundingBox], scores: &[f32], iou_thresh: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order[pos + 1..] {
            if !suppressed[j] && boxes[i].iou(&boxes[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// `dst = [a -b; b a] * src + [tx, ty]`: rotation, uniform scale, translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    /// Least-squares fit mapping `src` points onto `dst` points.
    ///
    /// Returns `None` when the source points are degenerate (all coincident).
    pub fn estimate(src: &[(f32, f32)], dst: &[(f32, f32)]) -> Option<Self> {
        debug_assert_eq!(src.len(), dst.len());
        let n = src.len() as f32;
        if n == 0.0 {
            return None;
        }
        let mean = |pts: &[(f32, f32)]| {
            let (sx, sy) = pts
                .iter()
                .fold((0.0f32, 0.0f32), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / n, sy / n)
        };
        let (sx, sy) = mean(src);
        let (dx, dy) = mean(dst);

        let mut dot = 0.0;
        let mut cross = 0.0;
        let mut var = 0.0;
        for ((px, py), (qx, qy)) in src.iter().zip(dst.iter()) {
            let (px, py) = (px - sx, py - sy);
            let (qx, qy) = (qx - dx, qy - dy);
            dot += px * qx + py * qy;
            cross += px * qy - py * qx;
            var += px * px + py * py;
        }
        if var <= f32::EPSILON {
            return None;
        }

        let a = dot / var;
        let b = cross / var;
        Some(Self {
            a,
            b,
            tx: dx - (a * sx - b * sy),
            ty: dy - (b * sx + a * sy),
        })
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Maps a destination point back to the source, if the transform is invertible.
    pub fn invert(&self, (x, y): (f32, f32)) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det <= f32::EPSILON {
            return None;
        }
        let (x, y) = (x - self.tx, y - self.ty);
        Some((
            (self.a * x + self.b * y) / det,
            (-self.b * x + self.a * y) / det,
        ))
    }
}

/// Bilinear sample at fractional `(x, y)`. Points outside the grid read as
/// black, matching a constant-border affine warp.
pub fn sample_bilinear(grid: &PixelGrid, x: f32, y: f32) -> [f32; 3] {
    let w = grid.width() as i64;
    let h = grid.height() as i64;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |xi: i64, yi: i64| -> [f32; 3] {
        if xi < 0 || yi < 0 || xi >= w || yi >= h {
            return [0.0; 3];
        }
        let p = grid.pixel(xi as u32, yi as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0.0; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}
