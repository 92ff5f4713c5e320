//! Point cloud data and the asset seam

pub mod point;
pub mod source;

pub use point::CloudPoint;
pub use source::{CloudSource, InMemoryCloud, LodSettings};
