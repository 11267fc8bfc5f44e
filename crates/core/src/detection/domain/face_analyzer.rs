use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::shared::pixel_grid::PixelGrid;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("model session lock poisoned")]
    LockPoisoned,
}

impl AnalysisError {
    pub fn inference(e: impl std::fmt::Display) -> Self {
        AnalysisError::Inference(e.to_string())
    }
}

/// Domain interface for face detection + embedding.
///
/// Shared read-only by every in-flight request, hence `&self` and `Sync`.
/// Backends wrapping non-reentrant sessions serialize access internally.
/// Detections come back in the backend's own order; callers must not re-sort.
pub trait FaceAnalyzer: Send + Sync {
    fn analyze(&self, grid: &PixelGrid) -> Result<Vec<Detection>, AnalysisError>;
}
