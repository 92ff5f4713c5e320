//! Build the LOD octree for a synthetic point cloud and dump per-level stats
//!
//! Usage: cargo run --release --bin lod_report [settings.json]

use stipple::cloud::{InMemoryCloud, LodSettings};
use stipple::core::types::Vec3;
use stipple::octree::Octree;

const POINT_COUNT: usize = 100_000;
const CLOUD_SIZE: f32 = 100.0;

fn main() {
    stipple::core::logging::init();

    let settings: LodSettings = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).expect("Failed to read settings file");
            serde_json::from_str(&text).expect("Failed to parse settings")
        }
        None => LodSettings::default(),
    };

    // Deterministic xorshift cloud
    let mut state = 0x9e3779b97f4a7c15u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 40) as f32 / (1u64 << 24) as f32
    };
    let positions: Vec<Vec3> = (0..POINT_COUNT)
        .map(|_| Vec3::new(next(), next(), next()) * CLOUD_SIZE)
        .collect();

    let cloud = InMemoryCloud::new(positions, settings).expect("Invalid LOD settings");
    let mut tree = Octree::new();
    tree.rebuild(&cloud).expect("Rebuild failed");
    tree.print_stats();
}
