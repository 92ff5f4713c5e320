//! Multi-resolution LOD octree build and query

pub mod node;
pub mod reservation;
pub mod stats;
pub mod tree;

pub use node::Node;
pub use reservation::ReservationMap;
pub use stats::LevelStats;
pub use tree::Octree;
