pub mod blob_publisher;
pub mod blob_store;
pub mod crop_encoder;
pub mod object_key;
