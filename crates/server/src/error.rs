use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use facevault_core::pipeline::detect_faces_use_case::DetectFacesError;

/// HTTP-facing error. Serialized as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl From<DetectFacesError> for ApiError {
    fn from(e: DetectFacesError) -> Self {
        if e.is_client_error() {
            log::warn!("Rejected upload: {e}");
            Self::bad_request(e.to_string())
        } else {
            log::error!("Request failed: {e}");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}
