pub mod arcface_embedder;
pub mod execution_provider;
pub mod math;
pub mod onnx_face_analyzer;
pub mod yolo_face_detector;
