pub mod detect_faces_use_case;
pub mod pipeline_logger;
