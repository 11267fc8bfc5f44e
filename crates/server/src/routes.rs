use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::timeout::TimeoutLayer;

use facevault_core::pipeline::detect_faces_use_case::{
    DetectFacesOutcome, FaceResult, UploadedImage,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

#[derive(Serialize, Debug)]
pub struct BoxBody {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

#[derive(Serialize, Debug)]
pub struct FaceBody {
    pub face_id: usize,
    pub bbox: BoxBody,
    pub entity_path: String,
    pub embedding: Vec<f32>,
}

#[derive(Serialize, Debug)]
pub struct DetectFacesResponse {
    pub message: &'static str,
    pub faces_count: usize,
    pub faces: Vec<FaceBody>,
}

impl From<FaceResult> for FaceBody {
    fn from(face: FaceResult) -> Self {
        Self {
            face_id: face.face_id,
            bbox: BoxBody {
                x1: face.bbox.x1,
                y1: face.bbox.y1,
                x2: face.bbox.x2,
                y2: face.bbox.y2,
            },
            entity_path: face.entity_path,
            embedding: face.embedding,
        }
    }
}

impl From<DetectFacesOutcome> for DetectFacesResponse {
    fn from(outcome: DetectFacesOutcome) -> Self {
        Self {
            message: outcome.message,
            faces_count: outcome.faces_count(),
            faces: outcome.faces.into_iter().map(FaceBody::from).collect(),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize, request_timeout: Duration) -> Router {
    Router::new()
        .route("/detect-faces", post(detect_faces))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(timeout_as_json))
        .with_state(state)
}

/// The timeout layer answers with an empty 408; give it the usual error body.
async fn timeout_as_json(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        log::warn!("Request timed out");
        return ApiError::new(StatusCode::REQUEST_TIMEOUT, "Request timed out.").into_response();
    }
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn detect_faces(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectFacesResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let upload = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{FILE_FIELD}' field.")))?;
    log::info!(
        "POST /detect-faces: {} bytes ({})",
        upload.bytes.len(),
        upload.content_type.as_deref().unwrap_or("no content type")
    );

    let outcome = state.detect_faces.execute(upload).await?;
    Ok(Json(outcome.into()))
}

/// First field named [`FILE_FIELD`]; other fields are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedImage>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(UploadedImage::new(bytes.to_vec(), content_type)));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), e.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use facevault_core::decoding::infrastructure::image_crate_decoder::ImageCrateDecoder;
    use facevault_core::detection::domain::detection::Detection;
    use facevault_core::detection::domain::face_analyzer::{AnalysisError, FaceAnalyzer};
    use facevault_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
    use facevault_core::pipeline::pipeline_logger::NullPipelineLogger;
    use facevault_core::publishing::domain::blob_publisher::BlobPublisher;
    use facevault_core::publishing::domain::object_key::ObjectKeyGenerator;
    use facevault_core::publishing::infrastructure::in_memory_blob_store::InMemoryBlobStore;
    use facevault_core::publishing::infrastructure::jpeg_crop_encoder::JpegCropEncoder;
    use facevault_core::shared::bounding_box::BoundingBox;
    use facevault_core::shared::pixel_grid::PixelGrid;
    use rstest::rstest;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "facevault-test-boundary";
    const BASE_URL: &str = "https://faces-bucket.s3.us-east-1.amazonaws.com";

    struct StubAnalyzer(Vec<Detection>);

    impl FaceAnalyzer for StubAnalyzer {
        fn analyze(&self, _grid: &PixelGrid) -> Result<Vec<Detection>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    fn face(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(BoundingBox::new(x1, y1, x2, y2), 0.9, None, vec![1.0, 1.0, 1.0, 1.0])
    }

    /// Holds every request longer than the router's deadline.
    struct SlowAnalyzer(Duration);

    impl FaceAnalyzer for SlowAnalyzer {
        fn analyze(&self, _grid: &PixelGrid) -> Result<Vec<Detection>, AnalysisError> {
            std::thread::sleep(self.0);
            Ok(Vec::new())
        }
    }

    fn build_app(
        analyzer: Arc<dyn FaceAnalyzer>,
        max_upload_bytes: usize,
        request_timeout: Duration,
    ) -> (Router, Arc<InMemoryBlobStore>) {
        let store = Arc::new(InMemoryBlobStore::new());
        let publisher = BlobPublisher::new(
            Arc::new(JpegCropEncoder::default()),
            store.clone(),
            ObjectKeyGenerator::new("faces"),
            BASE_URL,
        );
        let use_case = DetectFacesUseCase::new(
            Arc::new(ImageCrateDecoder::new()),
            analyzer,
            Arc::new(publisher),
            Arc::new(NullPipelineLogger),
        );
        let app = router(AppState::new(use_case), max_upload_bytes, request_timeout);
        (app, store)
    }

    fn app_with_limit(
        detections: Vec<Detection>,
        max_upload_bytes: usize,
    ) -> (Router, Arc<InMemoryBlobStore>) {
        build_app(
            Arc::new(StubAnalyzer(detections)),
            max_upload_bytes,
            Duration::from_secs(30),
        )
    }

    fn app(detections: Vec<Detection>) -> (Router, Arc<InMemoryBlobStore>) {
        app_with_limit(detections, 20 * 1024 * 1024)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 90, 60]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// One-part multipart body. `content_type: None` omits the part header.
    fn multipart_body(field: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n"
        )
        .into_bytes();
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn detect_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/detect-faces")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(Vec::new());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_detect_faces_response_shape() {
        let (app, store) = app(vec![face(2.0, 3.0, 20.0, 25.0), face(30.0, 10.0, 70.0, 60.0)]);
        let body = multipart_body("file", Some("image/png"), &png(64, 48));
        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Faces detected and embeddings generated.");
        assert_eq!(json["faces_count"], 2);
        let faces = json["faces"].as_array().unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0]["face_id"], 0);
        assert_eq!(
            faces[0]["bbox"],
            serde_json::json!({ "x1": 2, "y1": 3, "x2": 20, "y2": 25 })
        );
        // Clamped to the 64x48 image
        assert_eq!(
            faces[1]["bbox"],
            serde_json::json!({ "x1": 30, "y1": 10, "x2": 64, "y2": 48 })
        );
        let path = faces[1]["entity_path"].as_str().unwrap();
        assert!(path.starts_with(&format!("{BASE_URL}/faces/")));
        assert!(path.ends_with(".jpg"));
        let embedding = faces[0]["embedding"].as_array().unwrap();
        assert_eq!(embedding.len(), 4);
        assert!((embedding[0].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_no_faces() {
        let (app, store) = app(Vec::new());
        let body = multipart_body("file", Some("image/png"), &png(16, 16));
        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "No faces detected in the image.");
        assert_eq!(json["faces_count"], 0);
        assert_eq!(json["faces"], serde_json::json!([]));
        assert!(store.is_empty());
    }

    #[rstest]
    #[case::non_image("file", Some("text/plain"), b"hello".to_vec())]
    #[case::no_content_type("file", None, b"hello".to_vec())]
    #[case::empty_file("file", Some("image/jpeg"), Vec::new())]
    #[case::undecodable("file", Some("image/png"), b"definitely not a png".to_vec())]
    #[case::wrong_field("image", Some("image/png"), png(8, 8))]
    #[tokio::test]
    async fn test_bad_uploads_rejected(
        #[case] field: &str,
        #[case] content_type: Option<&str>,
        #[case] data: Vec<u8>,
    ) {
        let (app, store) = app(vec![face(0.0, 0.0, 4.0, 4.0)]);
        let body = multipart_body(field, content_type, &data);
        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["detail"].as_str().is_some_and(|d| !d.is_empty()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_multipart_request_rejected() {
        let (app, _) = app(Vec::new());
        let request = Request::builder()
            .method("POST")
            .uri("/detect-faces")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn test_storage_failure_is_500_without_faces() {
        let (app, store) = app(vec![face(0.0, 0.0, 8.0, 8.0), face(8.0, 8.0, 16.0, 16.0)]);
        store.fail_after(0);
        let body = multipart_body("file", Some("image/png"), &png(32, 32));
        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"]
            .as_str()
            .unwrap()
            .contains("simulated network error"));
        assert!(json.get("faces").is_none());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let (app, store) = app_with_limit(vec![face(0.0, 0.0, 4.0, 4.0)], 1024);
        let body = multipart_body("file", Some("image/png"), &vec![7u8; 8 * 1024]);
        let (status, _) = send(app, detect_request(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_detail() {
        let (app, store) = build_app(
            Arc::new(SlowAnalyzer(Duration::from_millis(400))),
            20 * 1024 * 1024,
            Duration::from_millis(50),
        );
        let body = multipart_body("file", Some("image/png"), &png(16, 16));
        let response = app.oneshot(detect_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["detail"], "Request timed out.");
        assert!(store.is_empty());
    }
}
