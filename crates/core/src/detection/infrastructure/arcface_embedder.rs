//! ArcFace face embedder using ONNX Runtime.
//!
//! Faces with a full set of landmarks are aligned to the canonical ArcFace
//! five-point template before inference; others fall back to a resized
//! bounding-box crop.

use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_analyzer::AnalysisError;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::infrastructure::execution_provider::{build_session, ComputeContext};
use crate::detection::infrastructure::math::{sample_bilinear, Similarity};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::pixel_grid::PixelGrid;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Landmark positions of an aligned 112x112 ArcFace input.
pub const ARCFACE_TEMPLATE: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Eyes closer than this (in source pixels) are too small to align reliably.
const MIN_EYE_SPAN: f32 = 2.0;

pub struct ArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path, ctx: ComputeContext) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, ctx)?;
        log::info!("Face embedder loaded ({ctx})");
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Raw (unnormalized) embedding of one face.
    pub fn embed(
        &self,
        grid: &PixelGrid,
        bbox: &BoundingBox,
        landmarks: Option<&FaceLandmarks>,
    ) -> Result<Vec<f32>, AnalysisError> {
        let tensor = preprocess(grid, bbox, landmarks);
        let input_value = ort::value::Tensor::from_array(tensor).map_err(AnalysisError::inference)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| AnalysisError::LockPoisoned)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(AnalysisError::inference)?;
        let embedding_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(AnalysisError::inference)?;
        let embedding: Vec<f32> = embedding_array.iter().copied().collect();
        if embedding.is_empty() {
            return Err(AnalysisError::UnexpectedOutput(
                "embedder produced an empty vector".into(),
            ));
        }
        Ok(embedding)
    }
}

/// 112x112 normalized NCHW input for one face.
fn preprocess(
    grid: &PixelGrid,
    bbox: &BoundingBox,
    landmarks: Option<&FaceLandmarks>,
) -> ndarray::Array4<f32> {
    match alignment_transform(landmarks) {
        Some(transform) => warp_aligned(grid, &transform),
        None => resize_bbox(grid, bbox),
    }
}

/// Similarity transform from source landmarks onto the ArcFace template.
fn alignment_transform(landmarks: Option<&FaceLandmarks>) -> Option<Similarity> {
    let landmarks = landmarks?;
    if landmarks.eye_span()? < MIN_EYE_SPAN {
        return None;
    }
    let points = landmarks.complete()?;
    Similarity::estimate(&points, &ARCFACE_TEMPLATE)
}

fn warp_aligned(grid: &PixelGrid, transform: &Similarity) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let px = match transform.invert((x as f32, y as f32)) {
                Some((sx, sy)) => sample_bilinear(grid, sx, sy),
                None => [0.0; 3],
            };
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

/// Nearest-neighbor resize of the clamped bbox region to 112x112.
fn resize_bbox(grid: &PixelGrid, bbox: &BoundingBox) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, INPUT_SIZE, INPUT_SIZE),
        -NORM_MEAN / NORM_STD,
    );
    let Some(rect) = bbox.clamp_to(grid.width(), grid.height()) else {
        return tensor;
    };
    let src_w = rect.width() as f64;
    let src_h = rect.height() as f64;

    for y in 0..INPUT_SIZE {
        let sy = rect.y1
            + (((y as f64 + 0.5) * src_h / INPUT_SIZE as f64) as u32).min(rect.height() - 1);
        for x in 0..INPUT_SIZE {
            let sx = rect.x1
                + (((x as f64 + 0.5) * src_w / INPUT_SIZE as f64) as u32).min(rect.width() - 1);
            let px = grid.pixel(sx, sy);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}
