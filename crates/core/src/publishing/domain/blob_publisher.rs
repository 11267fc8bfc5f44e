use std::sync::Arc;

use thiserror::Error;

use crate::cropping::crop_extractor::FaceCrop;
use crate::publishing::domain::blob_store::{BlobStore, BlobStoreError};
use crate::publishing::domain::crop_encoder::{CropEncoder, EncodedImage};
use crate::publishing::domain::object_key::ObjectKeyGenerator;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Error encoding the crop: {0}")]
    Encode(String),
    #[error("Failed to upload to storage: {0}")]
    Upload(#[from] BlobStoreError),
}

/// A stored crop and the URL it can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedAsset {
    pub key: String,
    pub url: String,
}

/// Encodes face crops and uploads them under unique keys.
///
/// The URL is derived from the public base URL and the key alone; nothing is
/// read back from the store.
pub struct BlobPublisher {
    encoder: Arc<dyn CropEncoder>,
    store: Arc<dyn BlobStore>,
    keys: ObjectKeyGenerator,
    public_base_url: String,
}

impl BlobPublisher {
    pub fn new(
        encoder: Arc<dyn CropEncoder>,
        store: Arc<dyn BlobStore>,
        keys: ObjectKeyGenerator,
        public_base_url: &str,
    ) -> Self {
        Self {
            encoder,
            store,
            keys,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Encode + upload in one step.
    pub async fn publish(&self, crop: &FaceCrop) -> Result<PublishedAsset, PublishError> {
        let image = self.encode(crop)?;
        self.upload(image).await
    }

    /// CPU-bound half of [`publish`](Self::publish).
    pub fn encode(&self, crop: &FaceCrop) -> Result<EncodedImage, PublishError> {
        self.encoder.encode(&crop.pixels)
    }

    /// Network half of [`publish`](Self::publish).
    pub async fn upload(&self, image: EncodedImage) -> Result<PublishedAsset, PublishError> {
        let key = self.keys.generate(image.extension);
        let size = image.bytes.len();
        self.store.put(&key, image.bytes, image.content_type).await?;
        log::debug!("Uploaded {key} ({size} bytes)");
        Ok(PublishedAsset {
            url: self.public_url(&key),
            key,
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publishing::infrastructure::in_memory_blob_store::InMemoryBlobStore;
    use crate::publishing::infrastructure::jpeg_crop_encoder::JpegCropEncoder;
    use crate::shared::bounding_box::PixelRect;
    use crate::shared::pixel_grid::PixelGrid;

    const BASE_URL: &str = "https://bucket.s3.us-east-1.amazonaws.com";

    struct FailingEncoder;

    impl CropEncoder for FailingEncoder {
        fn encode(&self, _pixels: &PixelGrid) -> Result<EncodedImage, PublishError> {
            Err(PublishError::Encode("boom".into()))
        }
    }

    fn crop(width: u32, height: u32) -> FaceCrop {
        FaceCrop {
            rect: PixelRect {
                x1: 0,
                y1: 0,
                x2: width,
                y2: height,
            },
            pixels: PixelGrid::new(vec![90; (width * height * 3) as usize], width, height),
        }
    }

    fn publisher(store: Arc<InMemoryBlobStore>, base_url: &str) -> BlobPublisher {
        BlobPublisher::new(
            Arc::new(JpegCropEncoder::default()),
            store,
            ObjectKeyGenerator::new("faces"),
            base_url,
        )
    }

    #[tokio::test]
    async fn test_publish_stores_jpeg_under_faces_prefix() {
        let store = Arc::new(InMemoryBlobStore::new());
        let asset = publisher(store.clone(), BASE_URL)
            .publish(&crop(16, 12))
            .await
            .unwrap();

        assert!(asset.key.starts_with("faces/"));
        assert!(asset.key.ends_with(".jpg"));
        assert_eq!(asset.url, format!("{BASE_URL}/{}", asset.key));

        let object = store.get(&asset.key).unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        let decoded = image::load_from_memory(&object.body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[tokio::test]
    async fn test_publish_twice_gives_distinct_urls() {
        let store = Arc::new(InMemoryBlobStore::new());
        let publisher = publisher(store.clone(), BASE_URL);
        let a = publisher.publish(&crop(8, 8)).await.unwrap();
        let b = publisher.publish(&crop(8, 8)).await.unwrap();
        assert_ne!(a.url, b.url);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_as_publish_error() {
        let store = Arc::new(InMemoryBlobStore::new());
        store.fail_after(0);
        let result = publisher(store.clone(), BASE_URL).publish(&crop(8, 8)).await;
        assert!(matches!(result, Err(PublishError::Upload(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_encode_failure_skips_upload() {
        let store = Arc::new(InMemoryBlobStore::new());
        let publisher = BlobPublisher::new(
            Arc::new(FailingEncoder),
            store.clone(),
            ObjectKeyGenerator::new("faces"),
            BASE_URL,
        );
        let result = publisher.publish(&crop(8, 8)).await;
        assert!(matches!(result, Err(PublishError::Encode(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_public_url_trims_trailing_slash() {
        let publisher = publisher(Arc::new(InMemoryBlobStore::new()), "http://localhost:9000/bucket/");
        assert_eq!(
            publisher.public_url("faces/a.jpg"),
            "http://localhost:9000/bucket/faces/a.jpg"
        );
    }
}
