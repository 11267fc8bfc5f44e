use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;

use crate::publishing::domain::blob_store::{BlobStore, BlobStoreError};

/// Connection settings for an S3 (or S3-compatible) bucket.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Custom endpoint (MinIO, R2, ...). Enables path-style addressing.
    pub endpoint_url: Option<String>,
}

impl S3Settings {
    /// Virtual-hosted public URL of the bucket on AWS.
    pub fn public_base_url(&self) -> String {
        format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }
}

/// [`BlobStore`] backed by `aws-sdk-s3`. Objects are written `public-read`.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds a client from static credentials. No network traffic happens
    /// until the first upload.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .credentials_provider(Credentials::new(
                settings.access_key.clone(),
                settings.secret_key.clone(),
                None,
                None,
                "static",
            ));
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let base_config = loader.load().await;

        let s3_config = S3ConfigBuilder::from(&base_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();
        log::info!(
            "S3 storage: bucket '{}' in {}",
            settings.bucket,
            settings.region
        );
        Self::new(S3Client::from_conf(s3_config), settings.bucket.clone())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| BlobStoreError {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}
