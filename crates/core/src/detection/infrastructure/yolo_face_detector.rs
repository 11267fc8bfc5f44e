//! YOLO face detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, and NMS post-processing.
//! Boxes and landmarks are mapped back to source-image coordinates but
//! left unclamped.

use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_analyzer::AnalysisError;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::infrastructure::execution_provider::{build_session, ComputeContext};
use crate::detection::infrastructure::math;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::pixel_grid::PixelGrid;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.45;

/// Number of keypoint values per detection (5 landmarks × x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f32 = 0.5;

/// Letterbox fill, YOLO convention.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A face box from the detector, before embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub score: f32,
    pub landmarks: Option<FaceLandmarks>,
}

/// YOLO face detector backed by an ONNX Runtime session.
pub struct YoloFaceDetector {
    session: Mutex<ort::session::Session>,
    confidence: f32,
    input_size: u32,
}

impl YoloFaceDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (NCHW) when
    /// it is static; otherwise `input_size` is used.
    pub fn new(
        model_path: &Path,
        ctx: ComputeContext,
        confidence: f32,
        input_size: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, ctx)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W], square input
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(input_size);
        log::info!("Face detector loaded (input {input_size}x{input_size}, {ctx})");

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }

    pub fn detect(&self, grid: &PixelGrid) -> Result<Vec<DetectedFace>, AnalysisError> {
        let letterboxed = letterbox(grid, self.input_size);
        let input_value =
            ort::value::Tensor::from_array(letterboxed.tensor).map_err(AnalysisError::inference)?;

        let (shape, data) = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| AnalysisError::LockPoisoned)?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(AnalysisError::inference)?;
            if outputs.len() == 0 {
                return Err(AnalysisError::UnexpectedOutput(
                    "detector produced no outputs".into(),
                ));
            }
            let tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(AnalysisError::inference)?;
            (tensor.shape().to_vec(), tensor.iter().copied().collect::<Vec<f32>>())
        };

        let raw = parse_output(&shape, &data, self.confidence, &letterboxed.mapping)?;
        let boxes: Vec<BoundingBox> = raw.iter().map(|f| f.bbox).collect();
        let scores: Vec<f32> = raw.iter().map(|f| f.score).collect();
        let keep = math::nms(&boxes, &scores, NMS_IOU_THRESH);

        let mut raw: Vec<Option<DetectedFace>> = raw.into_iter().map(Some).collect();
        Ok(keep.into_iter().filter_map(|i| raw[i].take()).collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox → source coordinate mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxMapping {
    scale: f32,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxMapping {
    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    mapping: LetterboxMapping,
}

/// Letterbox-resize a grid to `target_size` × `target_size`, NCHW float32 in [0, 1].
fn letterbox(grid: &PixelGrid, target_size: u32) -> Letterboxed {
    let fw = grid.width() as f32;
    let fh = grid.height() as f32;
    let target = target_size as f32;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = grid.as_ndarray(); // [H, W, C]
    let src_h = grid.height() as usize;
    let src_w = grid.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        mapping: LetterboxMapping {
            scale,
            pad_x,
            pad_y,
        },
    }
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Parses `[1, features, detections]` (transposed) or `[1, detections, features]`.
///
/// Row format: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn parse_output(
    shape: &[usize],
    data: &[f32],
    confidence: f32,
    mapping: &LetterboxMapping,
) -> Result<Vec<DetectedFace>, AnalysisError> {
    if shape.len() != 3 {
        return Err(AnalysisError::UnexpectedOutput(format!(
            "detector output shape {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(AnalysisError::UnexpectedOutput(format!(
            "detector output shape {shape:?} with {} values",
            data.len()
        )));
    }

    let value = |det: usize, feat: usize| {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut faces = Vec::new();
    for i in 0..num_dets {
        let score = value(i, 4);
        if score < confidence {
            continue;
        }

        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = mapping.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = mapping.to_source(cx + w / 2.0, cy + h / 2.0);

        let landmarks = (num_feats >= 5 + NUM_KEYPOINT_VALUES).then(|| {
            let mut pts = [None; 5];
            for (k, pt) in pts.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if value(i, base + 2) >= KEYPOINT_CONF_THRESH {
                    *pt = Some(mapping.to_source(value(i, base), value(i, base + 1)));
                }
            }
            FaceLandmarks::new(pts)
        });

        faces.push(DetectedFace {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
            landmarks,
        });
    }
    Ok(faces)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
