pub mod image_crate_decoder;
