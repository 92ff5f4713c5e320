//! Tree-level orchestration: rebuild, thresholds, stats, runtime queries

use std::sync::Mutex;
use std::time::Instant;

use crate::cloud::source::CloudSource;
use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec3};
use crate::math::Aabb;
use crate::octree::node::{BuildContext, Node};
use crate::octree::reservation::{ReservationMap, MAX_RESERVATION_DEPTH};
use crate::octree::stats::LevelStats;

/// Multi-resolution LOD octree over a static point cloud.
///
/// Immutable between rebuilds. [`Octree::rebuild`] derives the whole
/// structure from the source's current parameters and point list; the
/// renderer then reads cells and [`Octree::distance_thresholds`] each frame.
#[derive(Default)]
pub struct Octree {
    max_lod: u32,
    minimum_node_point_count: usize,
    uses_sprites: bool,
    single_poly_sprite_min_lod: u32,
    /// Sampling stride per LOD value, `1 / (1 - reduction)^lod`
    skip_values: Vec<f64>,
    /// Per-depth build statistics, diagnostics only
    stats: Vec<LevelStats>,
    /// Per-LOD draw-distance cutoffs, finest first
    distance_thresholds: Vec<f32>,
    root: Option<Node>,
}

impl Octree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole tree from the source's current state.
    ///
    /// Drops the previous root first: a failed rebuild leaves the tree
    /// rootless, as does a cloud too small to form a single qualifying
    /// cell. The point-reservation map lives only for the duration of this
    /// call.
    pub fn rebuild(&mut self, source: &dyn CloudSource) -> Result<()> {
        let start = Instant::now();

        self.root = None;
        self.skip_values.clear();
        self.stats.clear();

        self.single_poly_sprite_min_lod = source.single_poly_sprite_min_lod();
        self.uses_sprites = source.uses_sprites();
        self.minimum_node_point_count = source.minimum_node_point_count();

        let lod_count = source.lod_count();
        if lod_count == 0 {
            log::error!("Cannot build LOD octree: source reports zero LOD levels");
            return Err(Error::Config("LOD level count must be at least 1".into()));
        }
        if lod_count as u32 > MAX_RESERVATION_DEPTH + 1 {
            log::error!(
                "Cannot build LOD octree: {} LOD levels exceed the {}-level reservation limit",
                lod_count,
                MAX_RESERVATION_DEPTH + 1
            );
            return Err(Error::Config(format!(
                "LOD level count {} exceeds maximum {}",
                lod_count,
                MAX_RESERVATION_DEPTH + 1
            )));
        }
        self.max_lod = lod_count as u32 - 1;

        // Geometric stride per LOD: each coarser level keeps (1 - reduction)
        // of the points per cell
        let reduction = f64::from(source.lod_reduction()).clamp(0.0, MAX_REDUCTION);
        self.skip_values = (0..lod_count)
            .map(|lod| 1.0 / (1.0 - reduction).powi(lod as i32))
            .collect();

        let reservations = ReservationMap::new(source.point_count());
        let stats = Mutex::new(vec![LevelStats::default(); lod_count]);

        self.resize_distance_thresholds(source);

        let points = source.enabled_points();
        let bounds = source.bounds();
        // Root box is the cube of the largest half-extent so octant
        // subdivision stays cubic
        let root_bounds = Aabb::from_center_half_extent(
            bounds.center(),
            Vec3::splat(bounds.half_extent().max_element()),
        );

        let ctx = BuildContext {
            max_lod: self.max_lod,
            minimum_node_point_count: self.minimum_node_point_count,
            uses_sprites: self.uses_sprites,
            single_poly_sprite_min_lod: self.single_poly_sprite_min_lod,
            skip_values: &self.skip_values,
            reservations: &reservations,
            stats: &stats,
        };
        self.root = Node::build(&ctx, root_bounds, &points, 0, None);

        self.stats = stats.into_inner().expect("octree build lock poisoned");
        drop(reservations);

        log::info!(
            "Rebuilt LOD octree: {} cells over {} levels from {} points in {:.1}ms",
            self.cell_count(),
            lod_count,
            points.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Refresh the threshold array in place. A concurrent reader may hold a
    /// view of the old array, so surviving slots are overwritten and the
    /// length adjusted incrementally rather than swapping in a fresh
    /// allocation.
    fn resize_distance_thresholds(&mut self, source: &dyn CloudSource) {
        let lod_count = source.lod_count();
        self.distance_thresholds.truncate(lod_count);
        for lod in 0..lod_count {
            let threshold = source.distance_threshold(lod);
            if lod < self.distance_thresholds.len() {
                self.distance_thresholds[lod] = threshold;
            } else {
                self.distance_thresholds.push(threshold);
            }
        }
    }

    /// Pick the LOD to render at a viewer distance: the first level whose
    /// threshold exceeds the distance, saturating at the coarsest.
    pub fn lod_for_distance(&self, distance: f32) -> u32 {
        for (lod, &threshold) in self.distance_thresholds.iter().enumerate() {
            if distance < threshold {
                return lod as u32;
            }
        }
        self.max_lod
    }

    /// Recompute every node's world bounds from the placement transform.
    pub fn apply_local_to_world(&mut self, transform: &Mat4) {
        if let Some(root) = &mut self.root {
            root.apply_local_to_world(transform);
        }
    }

    /// Preorder traversal over all cells.
    pub fn visit_cells<F: FnMut(&Node)>(&self, mut f: F) {
        if let Some(root) = &self.root {
            root.visit(&mut f);
        }
    }

    /// Total number of cells in the tree.
    pub fn cell_count(&self) -> usize {
        let mut count = 0;
        self.visit_cells(|_| count += 1);
        count
    }

    /// Log one line per level, coarsest last.
    pub fn print_stats(&self) {
        for (depth, stats) in self.stats.iter().enumerate() {
            let lod = self.max_lod - depth as u32;
            log::info!("[LOD {}] {}", lod, stats);
        }
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn max_lod(&self) -> u32 {
        self.max_lod
    }

    pub fn skip_values(&self) -> &[f64] {
        &self.skip_values
    }

    pub fn distance_thresholds(&self) -> &[f32] {
        &self.distance_thresholds
    }

    /// Per-depth build statistics (index 0 = root level).
    pub fn stats(&self) -> &[LevelStats] {
        &self.stats
    }
}

/// Largest accepted reduction factor; keeps `1 / (1 - reduction)` finite.
const MAX_REDUCTION: f64 = 0.999;
