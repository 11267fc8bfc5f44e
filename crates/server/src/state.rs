use std::sync::Arc;

use facevault_core::pipeline::detect_faces_use_case::DetectFacesUseCase;

/// Process-wide handles shared by every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub detect_faces: Arc<DetectFacesUseCase>,
}

impl AppState {
    pub fn new(detect_faces: DetectFacesUseCase) -> Self {
        Self {
            detect_faces: Arc::new(detect_faces),
        }
    }
}
