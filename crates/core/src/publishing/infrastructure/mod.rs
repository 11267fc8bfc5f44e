pub mod in_memory_blob_store;
pub mod jpeg_crop_encoder;
pub mod s3_blob_store;
