//! Stipple - a multi-resolution LOD octree over static point clouds
//!
//! Partitions a point cloud into a hierarchy of axis-aligned cells, assigns
//! each cell a level of detail, and builds a per-cell index buffer the
//! renderer can bind directly. The tree is immutable between rebuilds; the
//! asset layer supplies points through the [`cloud::CloudSource`] seam.

pub mod cloud;
pub mod core;
pub mod math;
pub mod octree;
