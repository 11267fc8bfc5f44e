use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;

/// One face found by a [`FaceAnalyzer`](super::face_analyzer::FaceAnalyzer).
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Unclamped box in source-image coordinates.
    pub bbox: BoundingBox,
    pub score: f32,
    pub landmarks: Option<FaceLandmarks>,
    /// Raw recognizer output.
    pub embedding: Vec<f32>,
    /// `embedding` scaled to unit L2 norm, ready for cosine similarity.
    pub normed_embedding: Vec<f32>,
}

impl Detection {
    pub fn new(
        bbox: BoundingBox,
        score: f32,
        landmarks: Option<FaceLandmarks>,
        embedding: Vec<f32>,
    ) -> Self {
        let normed_embedding = l2_normalized(&embedding);
        Self {
            bbox,
            score,
            landmarks,
            embedding,
            normed_embedding,
        }
    }

    /// The normalized embedding, if it is usable for similarity matching:
    /// non-empty, finite, and of unit length.
    pub fn usable_embedding(&self) -> Option<&[f32]> {
        let v = &self.normed_embedding;
        if v.is_empty() || v.iter().any(|x| !x.is_finite()) {
            return None;
        }
        if (l2_norm(v) - 1.0).abs() > 1e-3 {
            return None;
        }
        Some(v)
    }
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Copy of `v` scaled to unit length. A zero vector stays zero.
pub fn l2_normalized(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
