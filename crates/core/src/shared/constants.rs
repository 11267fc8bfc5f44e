/// A downloadable model artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelFile {
    pub name: &'static str,
    pub url: &'static str,
}

pub const YOLO_FACE_MODEL: ModelFile = ModelFile {
    name: "yolo11n-pose_widerface.onnx",
    url: "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx",
};

pub const ARCFACE_R50_MODEL: ModelFile = ModelFile {
    name: "w600k_r50.onnx",
    url: "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx",
};

/// Detector + recognizer pair selected by a model identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPack {
    pub id: &'static str,
    pub detector: ModelFile,
    pub embedder: ModelFile,
}

pub const DEFAULT_MODEL_PACK: &str = "buffalo_l";

/// Known packs. Pack ids follow InsightFace naming, but only the recognizer
/// matches the InsightFace pack of the same name: detection always runs the
/// YOLO pose face model, not SCRFD.
pub const MODEL_PACKS: &[ModelPack] = &[ModelPack {
    id: "buffalo_l",
    detector: YOLO_FACE_MODEL,
    embedder: ARCFACE_R50_MODEL,
}];

pub fn model_pack(id: &str) -> Option<&'static ModelPack> {
    MODEL_PACKS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Detector input resolution (square).
pub const DEFAULT_DETECTION_SIZE: u32 = 640;

pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;

/// Storage prefix for published face crops.
pub const FACES_FOLDER: &str = "faces";

pub const JPEG_QUALITY: u8 = 95;
