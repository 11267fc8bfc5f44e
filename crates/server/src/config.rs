use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use facevault_core::shared::constants::{
    model_pack, ModelPack, DEFAULT_DETECTION_CONFIDENCE, DEFAULT_DETECTION_SIZE,
    DEFAULT_MODEL_PACK, MODEL_PACKS,
};
use facevault_core::publishing::infrastructure::s3_blob_store::S3Settings;

/// Face detection service: crops every face in an uploaded image, publishes
/// the crops to S3 and returns boxes plus normalized embeddings.
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Parser, Clone, Debug)]
#[command(name = "facevault", version, args_override_self = true)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// Storage region.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// Storage access key id.
    #[arg(long, env = "AWS_ACCESS_KEY", hide_env_values = true)]
    pub aws_access_key: String,

    /// Storage secret access key.
    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    pub aws_secret_key: String,

    /// Bucket that receives the face crops (objects are public-read).
    #[arg(long, env = "AWS_PUBLIC_BUCKET_NAME")]
    pub bucket: String,

    /// Custom S3-compatible endpoint; switches to path-style addressing.
    #[arg(long, env = "S3_ENDPOINT_URL")]
    pub s3_endpoint_url: Option<String>,

    /// Base of the returned `entity_path` URLs
    /// [default: https://{bucket}.s3.{region}.amazonaws.com].
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Face model pack.
    #[arg(long, env = "FACE_MODEL", default_value = DEFAULT_MODEL_PACK)]
    pub face_model: String,

    /// Compute context: negative for CPU, otherwise the accelerator device id.
    #[arg(long, env = "FACE_CTX_ID", default_value_t = -1, allow_negative_numbers = true)]
    pub face_ctx_id: i32,

    /// Directory holding pre-downloaded model files.
    #[arg(long, env = "FACE_MODEL_DIR")]
    pub face_model_dir: Option<PathBuf>,

    /// Minimum detector confidence (0.0-1.0).
    #[arg(long, env = "DETECTION_CONFIDENCE", default_value_t = DEFAULT_DETECTION_CONFIDENCE)]
    pub detection_confidence: f32,

    /// Detector input size in pixels.
    #[arg(long, env = "DETECTION_SIZE", default_value_t = DEFAULT_DETECTION_SIZE)]
    pub detection_size: u32,

    /// Largest accepted request body.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Per-request deadline in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Checks what clap cannot express. Returns the resolved model pack.
    pub fn validate(&self) -> Result<&'static ModelPack, String> {
        for (name, value) in [
            ("AWS_ACCESS_KEY", &self.aws_access_key),
            ("AWS_SECRET_KEY", &self.aws_secret_key),
            ("AWS_PUBLIC_BUCKET_NAME", &self.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            return Err(format!(
                "DETECTION_CONFIDENCE must be between 0.0 and 1.0, got {}",
                self.detection_confidence
            ));
        }
        if self.detection_size == 0 || self.detection_size % 32 != 0 {
            return Err(format!(
                "DETECTION_SIZE must be a positive multiple of 32, got {}",
                self.detection_size
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be at least 1".into());
        }
        model_pack(&self.face_model).ok_or_else(|| {
            let known: Vec<&str> = MODEL_PACKS.iter().map(|p| p.id).collect();
            format!(
                "Unknown FACE_MODEL '{}' (available: {})",
                self.face_model,
                known.join(", ")
            )
        })
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.aws_region.clone(),
            access_key: self.aws_access_key.clone(),
            secret_key: self.aws_secret_key.clone(),
            bucket: self.bucket.clone(),
            endpoint_url: self.s3_endpoint_url.clone(),
        }
    }

    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.s3_settings().public_base_url(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
