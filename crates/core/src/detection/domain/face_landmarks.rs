//! 5-point face landmarks in source-image coordinates.
//!
//! Point order follows the common detector convention: left eye, right eye,
//! nose tip, left mouth corner, right mouth corner.

pub const LEFT_EYE: usize = 0;
pub const RIGHT_EYE: usize = 1;
pub const NOSE: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// `None` marks a landmark the detector was not confident about.
    points: [Option<(f32, f32)>; 5],
}

impl FaceLandmarks {
    pub fn new(points: [Option<(f32, f32)>; 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Option<(f32, f32)>; 5] {
        &self.points
    }

    /// All five points, or `None` if any is invisible.
    ///
    /// Alignment needs the full set; a partial set is not used.
    pub fn complete(&self) -> Option<[(f32, f32); 5]> {
        let mut out = [(0.0, 0.0); 5];
        for (slot, point) in out.iter_mut().zip(self.points.iter()) {
            *slot = (*point)?;
        }
        Some(out)
    }

    /// Horizontal distance between the eyes, if both are visible.
    pub fn eye_span(&self) -> Option<f32> {
        let (lx, _) = self.points[LEFT_EYE]?;
        let (rx, _) = self.points[RIGHT_EYE]?;
        Some((rx - lx).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontal() -> FaceLandmarks {
        FaceLandmarks::new([
            Some((40.0, 50.0)),
            Some((70.0, 50.0)),
            Some((55.0, 70.0)),
            Some((42.0, 90.0)),
            Some((68.0, 90.0)),
        ])
    }

    #[test]
    fn test_complete_returns_all_points() {
        let points = frontal().complete().unwrap();
        assert_eq!(points[NOSE], (55.0, 70.0));
    }

    #[test]
    fn test_complete_none_when_any_invisible() {
        let mut points = *frontal().points();
        points[3] = None;
        assert!(FaceLandmarks::new(points).complete().is_none());
    }

    #[test]
    fn test_eye_span() {
        assert_eq!(frontal().eye_span(), Some(30.0));
    }

    #[test]
    fn test_eye_span_missing_eye() {
        let mut points = *frontal().points();
        points[RIGHT_EYE] = None;
        assert_eq!(FaceLandmarks::new(points).eye_span(), None);
    }
}
