mod config;
mod error;
mod routes;
mod state;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use facevault_core::decoding::infrastructure::image_crate_decoder::ImageCrateDecoder;
use facevault_core::detection::domain::face_analyzer::FaceAnalyzer;
use facevault_core::detection::infrastructure::execution_provider::ComputeContext;
use facevault_core::detection::infrastructure::onnx_face_analyzer::{
    AnalyzerSettings, OnnxFaceAnalyzer,
};
use facevault_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
use facevault_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use facevault_core::publishing::domain::blob_publisher::BlobPublisher;
use facevault_core::publishing::domain::object_key::ObjectKeyGenerator;
use facevault_core::publishing::infrastructure::jpeg_crop_encoder::JpegCropEncoder;
use facevault_core::publishing::infrastructure::s3_blob_store::S3BlobStore;
use facevault_core::shared::constants::FACES_FOLDER;

use crate::config::Config;
use crate::state::AppState;

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    let pack = config.validate()?;

    // Model download uses a blocking HTTP client, so it must finish before
    // the async runtime exists.
    let ctx = ComputeContext::from_ctx_id(config.face_ctx_id);
    log::info!("Loading model pack '{}' on {ctx}", pack.id);
    let analyzer = OnnxFaceAnalyzer::load(&AnalyzerSettings {
        pack,
        ctx,
        confidence: config.detection_confidence,
        detection_size: config.detection_size,
        bundled_dir: config.face_model_dir.as_deref(),
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, Arc::new(analyzer)))
}

async fn serve(
    config: Config,
    analyzer: Arc<dyn FaceAnalyzer>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = S3BlobStore::connect(&config.s3_settings()).await;
    let public_base_url = config.public_base_url();
    let publisher = BlobPublisher::new(
        Arc::new(JpegCropEncoder::default()),
        Arc::new(store),
        ObjectKeyGenerator::new(FACES_FOLDER),
        &public_base_url,
    );
    log::info!("Publishing crops under {public_base_url}/{FACES_FOLDER}/");

    let logger = Arc::new(LogPipelineLogger::new());
    let use_case = DetectFacesUseCase::new(
        Arc::new(ImageCrateDecoder::new()),
        analyzer,
        Arc::new(publisher),
        logger.clone(),
    );
    let app = routes::router(
        AppState::new(use_case),
        config.max_upload_bytes,
        config.request_timeout(),
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    log::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    logger.summary();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Shutdown signal received, draining requests");
}
