pub mod bounding_box;
pub mod constants;
pub mod model_resolver;
pub mod pixel_grid;
