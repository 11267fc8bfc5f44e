use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use thiserror::Error;

use crate::cropping::crop_extractor;
use crate::decoding::domain::image_decoder::{DecodeError, ImageDecoder};
use crate::detection::domain::face_analyzer::{AnalysisError, FaceAnalyzer};
use crate::pipeline::pipeline_logger::{PipelineLogger, REQUEST_STAGE};
use crate::publishing::domain::blob_publisher::{BlobPublisher, PublishError};
use crate::publishing::domain::crop_encoder::EncodedImage;
use crate::shared::bounding_box::PixelRect;

pub const NO_FACES_MESSAGE: &str = "No faces detected in the image.";
pub const FACES_MESSAGE: &str = "Faces detected and embeddings generated.";

/// Failure of one detection's crop/publish/embedding step. Aborts the request.
#[derive(Error, Debug)]
pub enum FaceProcessingError {
    #[error("Error processing face {face_id}: {source}")]
    Publish {
        face_id: usize,
        #[source]
        source: PublishError,
    },
    #[error("Error processing face {face_id}: embedding is missing or not normalized")]
    MissingEmbedding { face_id: usize },
}

#[derive(Error, Debug)]
pub enum DetectFacesError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Face analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Processing(#[from] FaceProcessingError),
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl DetectFacesError {
    /// Caused by the upload itself (4xx) rather than by the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DetectFacesError::InvalidInput(_) | DetectFacesError::Decode(_)
        )
    }
}

/// Raw upload as received from the transport.
#[derive(Clone, Debug)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// Format-family pre-check. The decoder sniffs the real format later.
    pub fn validate(&self) -> Result<(), DetectFacesError> {
        match self.content_type.as_deref() {
            Some(ct) if is_image_content_type(ct) => {}
            Some(ct) => {
                return Err(DetectFacesError::InvalidInput(format!(
                    "File must be an image (got content type '{ct}')."
                )))
            }
            None => {
                return Err(DetectFacesError::InvalidInput(
                    "File must be an image (no content type given).".into(),
                ))
            }
        }
        if self.bytes.is_empty() {
            return Err(DetectFacesError::InvalidInput("File is empty.".into()));
        }
        Ok(())
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime.split_once('/') {
        Some((family, subtype)) => family.eq_ignore_ascii_case("image") && !subtype.is_empty(),
        None => false,
    }
}

/// One returned face. `face_id` is the detection's position in the
/// analyzer output, so skipped detections leave gaps.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceResult {
    pub face_id: usize,
    pub bbox: PixelRect,
    pub entity_path: String,
    pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectFacesOutcome {
    pub message: &'static str,
    pub faces: Vec<FaceResult>,
}

impl DetectFacesOutcome {
    pub fn faces_count(&self) -> usize {
        self.faces.len()
    }
}

/// A face that survived cropping, with its encoded crop ready to upload.
struct StagedFace {
    face_id: usize,
    rect: PixelRect,
    embedding: Vec<f32>,
    image: EncodedImage,
}

struct StagedRequest {
    detections: usize,
    faces: Vec<StagedFace>,
}

/// Request pipeline: validate → decode → analyze → crop → encode → upload.
///
/// CPU-bound stages run on tokio's blocking pool. Every crop is encoded and
/// every embedding checked before the first upload starts; uploads then run
/// concurrently and the first failure aborts the request.
pub struct DetectFacesUseCase {
    decoder: Arc<dyn ImageDecoder>,
    analyzer: Arc<dyn FaceAnalyzer>,
    publisher: Arc<BlobPublisher>,
    logger: Arc<dyn PipelineLogger>,
}

impl DetectFacesUseCase {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        analyzer: Arc<dyn FaceAnalyzer>,
        publisher: Arc<BlobPublisher>,
        logger: Arc<dyn PipelineLogger>,
    ) -> Self {
        Self {
            decoder,
            analyzer,
            publisher,
            logger,
        }
    }

    pub async fn execute(
        &self,
        upload: UploadedImage,
    ) -> Result<DetectFacesOutcome, DetectFacesError> {
        let request_start = Instant::now();
        upload.validate()?;

        let decoder = Arc::clone(&self.decoder);
        let analyzer = Arc::clone(&self.analyzer);
        let publisher = Arc::clone(&self.publisher);
        let logger = Arc::clone(&self.logger);
        let staged = tokio::task::spawn_blocking(move || {
            stage_faces(
                decoder.as_ref(),
                analyzer.as_ref(),
                &publisher,
                logger.as_ref(),
                &upload.bytes,
            )
        })
        .await
        .map_err(|e| DetectFacesError::Worker(e.to_string()))??;

        if staged.detections == 0 {
            self.logger.info(NO_FACES_MESSAGE);
            self.finish(request_start, 0);
            return Ok(DetectFacesOutcome {
                message: NO_FACES_MESSAGE,
                faces: Vec::new(),
            });
        }

        let t = Instant::now();
        let uploads = staged.faces.into_iter().map(|face| {
            let publisher = &self.publisher;
            async move {
                let StagedFace {
                    face_id,
                    rect,
                    embedding,
                    image,
                } = face;
                let asset = publisher
                    .upload(image)
                    .await
                    .map_err(|source| FaceProcessingError::Publish { face_id, source })?;
                Ok::<_, FaceProcessingError>(FaceResult {
                    face_id,
                    bbox: rect,
                    entity_path: asset.url,
                    embedding,
                })
            }
        });
        let faces = try_join_all(uploads).await.map_err(|e| {
            log::error!("{e}");
            e
        })?;
        self.logger
            .timing("upload", t.elapsed().as_secs_f64() * 1000.0);

        log::info!(
            "Returned {} of {} detected faces",
            faces.len(),
            staged.detections
        );
        self.finish(request_start, faces.len());
        Ok(DetectFacesOutcome {
            message: FACES_MESSAGE,
            faces,
        })
    }

    fn finish(&self, request_start: Instant, faces: usize) {
        self.logger.metric("faces", faces as f64);
        self.logger.timing(
            REQUEST_STAGE,
            request_start.elapsed().as_secs_f64() * 1000.0,
        );
    }
}

/// Blocking half of the pipeline. Runs on a worker thread.
fn stage_faces(
    decoder: &dyn ImageDecoder,
    analyzer: &dyn FaceAnalyzer,
    publisher: &BlobPublisher,
    logger: &dyn PipelineLogger,
    bytes: &[u8],
) -> Result<StagedRequest, DetectFacesError> {
    let t = Instant::now();
    let grid = decoder.decode(bytes)?;
    logger.timing("decode", t.elapsed().as_secs_f64() * 1000.0);
    log::debug!("Decoded {}x{} image", grid.width(), grid.height());

    let t = Instant::now();
    let detections = analyzer.analyze(&grid)?;
    logger.timing("analyze", t.elapsed().as_secs_f64() * 1000.0);

    let mut crop_ms = 0.0;
    let mut encode_ms = 0.0;
    let mut skipped = 0usize;
    let mut faces = Vec::with_capacity(detections.len());
    for (face_id, detection) in detections.iter().enumerate() {
        let t = Instant::now();
        let crop = crop_extractor::extract(&grid, &detection.bbox);
        crop_ms += t.elapsed().as_secs_f64() * 1000.0;

        let Some(crop) = crop else {
            skipped += 1;
            log::warn!(
                "Skipping face {face_id}: box ({:.1}, {:.1}, {:.1}, {:.1}) is empty inside {}x{}",
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2,
                grid.width(),
                grid.height()
            );
            continue;
        };

        let embedding = detection
            .usable_embedding()
            .ok_or(FaceProcessingError::MissingEmbedding { face_id })?
            .to_vec();

        let t = Instant::now();
        let image = publisher
            .encode(&crop)
            .map_err(|source| FaceProcessingError::Publish { face_id, source })?;
        encode_ms += t.elapsed().as_secs_f64() * 1000.0;

        faces.push(StagedFace {
            face_id,
            rect: crop.rect,
            embedding,
            image,
        });
    }

    if !detections.is_empty() {
        logger.timing("crop", crop_ms);
        logger.timing("encode", encode_ms);
    }
    logger.metric("skipped_detections", skipped as f64);
    Ok(StagedRequest {
        detections: detections.len(),
        faces,
    })
}
