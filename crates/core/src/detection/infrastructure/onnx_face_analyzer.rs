use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_analyzer::{AnalysisError, FaceAnalyzer};
use crate::detection::infrastructure::arcface_embedder::ArcFaceEmbedder;
use crate::detection::infrastructure::execution_provider::ComputeContext;
use crate::detection::infrastructure::yolo_face_detector::YoloFaceDetector;
use crate::shared::constants::ModelPack;
use crate::shared::model_resolver;
use crate::shared::pixel_grid::PixelGrid;

/// Detector + recognizer pair behind the [`FaceAnalyzer`] interface.
///
/// Output order is the detector's: descending confidence after NMS.
pub struct OnnxFaceAnalyzer {
    detector: YoloFaceDetector,
    embedder: ArcFaceEmbedder,
}

/// Settings for [`OnnxFaceAnalyzer::load`].
#[derive(Clone, Debug)]
pub struct AnalyzerSettings<'a> {
    pub pack: &'a ModelPack,
    pub ctx: ComputeContext,
    pub confidence: f32,
    pub detection_size: u32,
    pub bundled_dir: Option<&'a Path>,
}

impl OnnxFaceAnalyzer {
    pub fn new(detector: YoloFaceDetector, embedder: ArcFaceEmbedder) -> Self {
        Self { detector, embedder }
    }

    /// Resolve (downloading if needed) and load both models. Blocking.
    pub fn load(settings: &AnalyzerSettings<'_>) -> Result<Self, Box<dyn std::error::Error>> {
        let detector_path = model_resolver::resolve(&settings.pack.detector, settings.bundled_dir)?;
        let embedder_path = model_resolver::resolve(&settings.pack.embedder, settings.bundled_dir)?;

        let detector = YoloFaceDetector::new(
            &detector_path,
            settings.ctx,
            settings.confidence,
            settings.detection_size,
        )?;
        let embedder = ArcFaceEmbedder::new(&embedder_path, settings.ctx)?;
        log::info!("Model pack '{}' ready", settings.pack.id);
        Ok(Self::new(detector, embedder))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&self, grid: &PixelGrid) -> Result<Vec<Detection>, AnalysisError> {
        let faces = self.detector.detect(grid)?;
        faces
            .into_iter()
            .map(|face| {
                let embedding = self
                    .embedder
                    .embed(grid, &face.bbox, face.landmarks.as_ref())?;
                Ok(Detection::new(face.bbox, face.score, face.landmarks, embedding))
            })
            .collect()
    }
}
