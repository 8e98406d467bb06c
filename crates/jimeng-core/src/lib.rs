pub mod backend;
pub mod config;
pub mod detector;
pub mod dimensions;
pub mod error;
pub mod image_refs;
pub mod normalize;
pub mod params;
pub mod patterns;
pub mod render;
pub mod sanitize;
pub mod types;
