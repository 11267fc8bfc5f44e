pub mod cropping;
pub mod decoding;
pub mod detection;
pub mod pipeline;
pub mod publishing;
pub mod shared;
