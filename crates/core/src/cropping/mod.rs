pub mod crop_extractor;
