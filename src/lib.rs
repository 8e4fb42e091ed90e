//! Shapecodec - display list and collision codec for console map geometry

pub mod core;
pub mod math;
pub mod mesh;
pub mod scene;
pub mod hit;
pub mod codec;
