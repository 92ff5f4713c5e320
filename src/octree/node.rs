//! Octree cell: region filtering, qualification, render cache, subdivision.
//!
//! A node claims the points inside its box that no sibling at the same depth
//! claimed first, subsamples them into an index buffer cache at its LOD's
//! stride, and splits into up to 8 child octants. Construction is recursive:
//! building the root builds the whole tree.

use std::sync::Mutex;

use rayon::prelude::*;

use crate::cloud::point::CloudPoint;
use crate::core::types::Mat4;
use crate::math::Aabb;
use crate::octree::reservation::ReservationMap;
use crate::octree::stats::LevelStats;

/// Immutable build parameters plus the shared structures every node touches.
///
/// The mutex owns the per-level statistics and doubles as the build lock:
/// the compound claim-and-qualify section runs under it, so two siblings can
/// never both claim a face point. It is never held across filtering or
/// cache construction.
pub(crate) struct BuildContext<'a> {
    pub max_lod: u32,
    pub minimum_node_point_count: usize,
    pub uses_sprites: bool,
    pub single_poly_sprite_min_lod: u32,
    /// Sampling stride per LOD value
    pub skip_values: &'a [f64],
    pub reservations: &'a ReservationMap,
    pub stats: &'a Mutex<Vec<LevelStats>>,
}

/// One cell of the LOD octree.
///
/// Only qualifying regions exist as nodes: a candidate octant with fewer
/// unclaimed points than the minimum is discarded during construction and
/// never linked into its parent.
pub struct Node {
    local_bounds: Aabb,
    world_bounds: Aabb,
    lod: u32,
    depth: u32,
    num_primitives: u32,
    ib_cache: Vec<u32>,
    children: Vec<Node>,
    child_index: u8,
}

impl Node {
    /// Try to build a cell over `bounds` from the parent's filtered point
    /// list. Returns `None` if too few unclaimed points fall inside.
    ///
    /// `merge_target` is the parent's first populated child slot; it only
    /// exists on the sequential subdivision path (see `build_cache`).
    pub(crate) fn build(
        ctx: &BuildContext<'_>,
        bounds: Aabb,
        points: &[CloudPoint],
        depth: u32,
        merge_target: Option<&mut Node>,
    ) -> Option<Node> {
        // The root spans the whole cloud and has no siblings to contend with
        let check_siblings = depth > 0;

        // Optimistic filter pass, no lock held. A face point that looks
        // unclaimed here can still be taken by a parallel sibling before we
        // reach the lock; those are re-checked below. Interior points are
        // never contended.
        let mut candidates: Vec<(CloudPoint, bool)> = Vec::new();
        for p in points {
            if !bounds.contains_point(p.position) {
                continue;
            }
            let on_face = bounds.on_face(p.position);
            if check_siblings && on_face && ctx.reservations.is_reserved(p.index, depth) {
                continue;
            }
            candidates.push((*p, on_face));
        }

        {
            let _stats = ctx.stats.lock().expect("octree build lock poisoned");
            if check_siblings {
                candidates.retain(|&(p, on_face)| {
                    !(on_face && ctx.reservations.is_reserved(p.index, depth))
                });
            }
            if candidates.len() < ctx.minimum_node_point_count {
                // Not a cell; nothing claimed, nothing recorded
                return None;
            }
            if check_siblings {
                for &(p, _) in &candidates {
                    ctx.reservations.reserve(p.index, depth);
                }
            }
        }

        let filtered: Vec<CloudPoint> = candidates.into_iter().map(|(p, _)| p).collect();

        let mut node = Node {
            local_bounds: bounds,
            world_bounds: bounds,
            lod: ctx.max_lod - depth,
            depth,
            num_primitives: 0,
            ib_cache: Vec::new(),
            children: Vec::new(),
            child_index: 0,
        };

        let stored = node.build_cache(ctx, &filtered, merge_target);
        if stored {
            let mut stats = ctx.stats.lock().expect("octree build lock poisoned");
            stats[depth as usize].record_cell(filtered.len(), node.num_primitives);
        }

        node.subdivide(ctx, &filtered);
        Some(node)
    }

    /// Subsample the claimed points at this cell's stride and emit the
    /// index sequence the renderer binds.
    ///
    /// At the finest level (`lod == 0`) the cache is folded into the
    /// parent's first populated child slot instead, so one octant split does
    /// not scatter a handful of points over several tiny draw batches. The
    /// fold is disabled for two-level trees: their finest level is the
    /// root's 8 parallel tasks, which race on the slot (`merge_target` is
    /// `None` on that path regardless).
    ///
    /// Returns whether the cache was stored on this node.
    fn build_cache(
        &mut self,
        ctx: &BuildContext<'_>,
        points: &[CloudPoint],
        merge_target: Option<&mut Node>,
    ) -> bool {
        let skip = ctx.skip_values[self.lod as usize];
        let samples = (points.len() as f64 / skip).ceil() as usize;
        let indices_per_point = if ctx.uses_sprites { 6 } else { 1 };

        let mut indices: Vec<u32> = Vec::with_capacity(samples * indices_per_point);
        let mut primitives = 0u32;

        // Fractional stride walk: sample wherever the accumulator crosses
        // an integer index
        let mut cursor = 0.0f64;
        while (cursor as usize) < points.len() {
            let vertex = points[cursor as usize].index;
            if ctx.uses_sprites {
                // 4 consecutive vertex slots per point (a quad)
                let base = vertex * 4;
                if self.lod >= ctx.single_poly_sprite_min_lod {
                    indices.extend_from_slice(&[base, base + 1, base + 2]);
                    primitives += 1;
                } else {
                    indices.extend_from_slice(&[
                        base, base + 1, base + 2,
                        base, base + 2, base + 3,
                    ]);
                    primitives += 2;
                }
            } else {
                indices.push(vertex);
                primitives += 1;
            }
            cursor += skip;
        }

        if self.lod == 0 && ctx.max_lod > 1 {
            if let Some(target) = merge_target {
                target.ib_cache.extend_from_slice(&indices);
                target.num_primitives += primitives;
                return false;
            }
        }

        self.ib_cache = indices;
        self.num_primitives = primitives;
        true
    }

    /// Split into 8 equal octants and keep the ones that qualify.
    ///
    /// Only the root fans out across worker threads; every deeper node
    /// subdivides sequentially on the thread that owns its branch, capping
    /// parallel fan-out at exactly 8 no matter how deep the tree goes.
    /// Children receive the already-filtered list, not the full inherited
    /// one.
    fn subdivide(&mut self, ctx: &BuildContext<'_>, points: &[CloudPoint]) {
        if self.depth == ctx.max_lod {
            return;
        }
        let child_depth = self.depth + 1;

        if self.depth == 0 {
            // Results are collected in octant order so the linked structure
            // does not depend on task completion order
            let candidates: Vec<Option<Node>> = (0..8u8)
                .into_par_iter()
                .map(|octant| {
                    Node::build(
                        ctx,
                        self.local_bounds.child_octant(octant),
                        points,
                        child_depth,
                        None,
                    )
                })
                .collect();
            for mut child in candidates.into_iter().flatten() {
                child.child_index = self.children.len() as u8;
                self.children.push(child);
            }
        } else {
            for octant in 0..8u8 {
                let octant_bounds = self.local_bounds.child_octant(octant);
                let candidate = Node::build(
                    ctx,
                    octant_bounds,
                    points,
                    child_depth,
                    self.children.first_mut(),
                );
                if let Some(mut child) = candidate {
                    child.child_index = self.children.len() as u8;
                    self.children.push(child);
                }
            }
        }
    }

    /// Recompute world bounds as the transformed local bounds, recursively.
    /// Local bounds never change after build.
    pub fn apply_local_to_world(&mut self, transform: &Mat4) {
        self.world_bounds = self.local_bounds.transformed(transform);
        for child in &mut self.children {
            child.apply_local_to_world(transform);
        }
    }

    /// Preorder traversal over this node and its subtree.
    pub fn visit<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Box in cloud-local space
    pub fn bounds(&self) -> &Aabb {
        &self.local_bounds
    }

    /// Box after the placement transform
    pub fn world_bounds(&self) -> &Aabb {
        &self.world_bounds
    }

    /// Resolution level this cell renders at (0 = finest)
    pub fn lod(&self) -> u32 {
        self.lod
    }

    /// Distance from the root (root = 0)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Render primitives this cell submits
    pub fn num_primitives(&self) -> u32 {
        self.num_primitives
    }

    /// Ordered vertex indices for the GPU index buffer
    pub fn ib_cache(&self) -> &[u32] {
        &self.ib_cache
    }

    /// Populated child cells, in octant order
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// This node's slot in its parent's child array
    pub fn child_index(&self) -> u8 {
        self.child_index
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn context<'a>(
        skip_values: &'a [f64],
        reservations: &'a ReservationMap,
        stats: &'a Mutex<Vec<LevelStats>>,
    ) -> BuildContext<'a> {
        BuildContext {
            max_lod: skip_values.len() as u32 - 1,
            minimum_node_point_count: 1,
            uses_sprites: false,
            single_poly_sprite_min_lod: 0,
            skip_values,
            reservations,
            stats,
        }
    }

    fn line_of_points(count: u32) -> Vec<CloudPoint> {
        (0..count)
            .map(|i| CloudPoint::new(Vec3::new(0.1 + i as f32 * 0.05, 0.5, 0.5), i))
            .collect()
    }

    #[test]
    fn test_stride_walk_samples_integer_crossings() {
        let points = line_of_points(10);
        let reservations = ReservationMap::new(10);
        let stats = Mutex::new(vec![LevelStats::default()]);
        // Single-level tree with an artificial stride of 4
        let ctx = context(&[4.0], &reservations, &stats);

        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let node = Node::build(&ctx, bounds, &points, 0, None).unwrap();

        assert_eq!(node.ib_cache(), &[0, 4, 8]);
        assert_eq!(node.num_primitives(), 3);
    }

    #[test]
    fn test_sprite_expansion_full_quad() {
        let points = line_of_points(3);
        let reservations = ReservationMap::new(3);
        let stats = Mutex::new(vec![LevelStats::default()]);
        let mut ctx = context(&[1.0], &reservations, &stats);
        ctx.uses_sprites = true;
        ctx.single_poly_sprite_min_lod = 1; // lod 0 stays below it

        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let node = Node::build(&ctx, bounds, &points, 0, None).unwrap();

        // Two triangles per point, 4 vertex slots apart
        assert_eq!(node.num_primitives(), 6);
        assert_eq!(node.ib_cache().len(), 18);
        assert_eq!(&node.ib_cache()[..6], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(&node.ib_cache()[6..12], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_sprite_expansion_single_triangle() {
        let points = line_of_points(2);
        let reservations = ReservationMap::new(2);
        let stats = Mutex::new(vec![LevelStats::default()]);
        let mut ctx = context(&[1.0], &reservations, &stats);
        ctx.uses_sprites = true;
        ctx.single_poly_sprite_min_lod = 0; // lod 0 is at the threshold

        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let node = Node::build(&ctx, bounds, &points, 0, None).unwrap();

        assert_eq!(node.num_primitives(), 2);
        assert_eq!(node.ib_cache(), &[0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn test_underpopulated_region_discarded() {
        let points = line_of_points(4);
        let reservations = ReservationMap::new(4);
        let stats = Mutex::new(vec![LevelStats::default()]);
        let mut ctx = context(&[1.0], &reservations, &stats);
        ctx.minimum_node_point_count = 5;

        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(Node::build(&ctx, bounds, &points, 0, None).is_none());
        // Nothing recorded for a discarded candidate
        assert_eq!(stats.lock().unwrap()[0].cells, 0);
    }
}
