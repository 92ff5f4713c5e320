//! Asset seam: where the octree gets its points and build parameters.
//!
//! The storage layer that owns the actual cloud lives outside this crate;
//! [`CloudSource`] is the contract it implements. [`InMemoryCloud`] is the
//! reference implementation used by tests, benches and tooling.

use serde::{Deserialize, Serialize};

use crate::cloud::point::CloudPoint;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::Aabb;

/// Build and LOD-selection parameters for a point cloud.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LodSettings {
    /// Number of LOD levels (tree depth = lod_count - 1)
    pub lod_count: usize,
    /// Draw-distance cutoff per LOD, finest first. Must have at least
    /// `lod_count` entries.
    pub distance_thresholds: Vec<f32>,
    /// Per-level point reduction factor, clamped to [0, 1) at build time
    pub reduction: f32,
    /// Minimum unclaimed points a region needs to become a cell
    pub minimum_node_point_count: usize,
    /// Render points as camera-facing quads instead of single vertices
    pub uses_sprites: bool,
    /// LOD at or above which a sprite degenerates to one triangle
    pub single_poly_sprite_min_lod: u32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            lod_count: 4,
            distance_thresholds: vec![25.0, 50.0, 100.0, 200.0],
            reduction: 0.5,
            minimum_node_point_count: 32,
            uses_sprites: false,
            single_poly_sprite_min_lod: 2,
        }
    }
}

impl LodSettings {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.distance_thresholds.len() < self.lod_count {
            return Err(Error::Source(format!(
                "{} distance thresholds for {} LOD levels",
                self.distance_thresholds.len(),
                self.lod_count
            )));
        }
        Ok(())
    }
}

/// Supplies the enabled point list and build parameters for an octree
/// rebuild.
///
/// Point indices returned by `enabled_points` must be dense: every index is
/// less than `point_count`, which sizes the build-time reservation map.
pub trait CloudSource: Send + Sync {
    /// All enabled points with their vertex buffer slots
    fn enabled_points(&self) -> Vec<CloudPoint>;
    /// Number of enabled points
    fn point_count(&self) -> usize;
    /// Number of LOD levels
    fn lod_count(&self) -> usize;
    /// Draw-distance cutoff for a LOD level
    fn distance_threshold(&self, lod: usize) -> f32;
    /// Whether points render as quads
    fn uses_sprites(&self) -> bool;
    /// LOD at or above which a sprite is a single triangle
    fn single_poly_sprite_min_lod(&self) -> u32;
    /// Region qualification threshold
    fn minimum_node_point_count(&self) -> usize;
    /// Per-level reduction factor
    fn lod_reduction(&self) -> f32;
    /// Bounding volume of the enabled points
    fn bounds(&self) -> Aabb;
}

/// In-memory point cloud with a per-point enabled mask.
///
/// Disabled points drop out of the enabled list entirely; the surviving
/// points are re-indexed densely in storage order, matching a renderer
/// vertex buffer that packs only enabled points.
pub struct InMemoryCloud {
    positions: Vec<Vec3>,
    enabled: Vec<bool>,
    settings: LodSettings,
}

impl InMemoryCloud {
    pub fn new(positions: Vec<Vec3>, settings: LodSettings) -> Result<Self> {
        settings.validate()?;
        let enabled = vec![true; positions.len()];
        Ok(Self { positions, enabled, settings })
    }

    /// Enable or disable a point by storage position.
    pub fn set_enabled(&mut self, position_index: usize, enabled: bool) {
        self.enabled[position_index] = enabled;
    }

    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut LodSettings {
        &mut self.settings
    }
}

impl CloudSource for InMemoryCloud {
    fn enabled_points(&self) -> Vec<CloudPoint> {
        self.positions
            .iter()
            .zip(&self.enabled)
            .filter(|&(_, &on)| on)
            .enumerate()
            .map(|(slot, (&position, _))| CloudPoint::new(position, slot as u32))
            .collect()
    }

    fn point_count(&self) -> usize {
        self.enabled.iter().filter(|&&on| on).count()
    }

    fn lod_count(&self) -> usize {
        self.settings.lod_count
    }

    fn distance_threshold(&self, lod: usize) -> f32 {
        self.settings.distance_thresholds[lod]
    }

    fn uses_sprites(&self) -> bool {
        self.settings.uses_sprites
    }

    fn single_poly_sprite_min_lod(&self) -> u32 {
        self.settings.single_poly_sprite_min_lod
    }

    fn minimum_node_point_count(&self) -> usize {
        self.settings.minimum_node_point_count
    }

    fn lod_reduction(&self) -> f32 {
        self.settings.reduction
    }

    fn bounds(&self) -> Aabb {
        let enabled: Vec<Vec3> = self.positions
            .iter()
            .zip(&self.enabled)
            .filter(|&(_, &on)| on)
            .map(|(&p, _)| p)
            .collect();
        Aabb::from_points(&enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_positions() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(3.0, 3.0, 3.0),
        ]
    }

    #[test]
    fn test_default_settings_validate() {
        assert!(LodSettings::default().validate().is_ok());
    }

    #[test]
    fn test_short_threshold_array_rejected() {
        let settings = LodSettings {
            lod_count: 4,
            distance_thresholds: vec![25.0, 50.0],
            ..LodSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Source(_))));
        assert!(InMemoryCloud::new(test_positions(), settings).is_err());
    }

    #[test]
    fn test_enabled_points_dense_indices() {
        let cloud = InMemoryCloud::new(test_positions(), LodSettings::default()).unwrap();
        let points = cloud.enabled_points();
        assert_eq!(points.len(), 4);
        assert_eq!(cloud.point_count(), 4);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.index, i as u32);
        }
    }

    #[test]
    fn test_disabled_points_excluded() {
        let mut cloud = InMemoryCloud::new(test_positions(), LodSettings::default()).unwrap();
        cloud.set_enabled(1, false);

        let points = cloud.enabled_points();
        assert_eq!(cloud.point_count(), 3);
        assert_eq!(points.len(), 3);
        // Survivors are re-indexed densely in storage order
        assert_eq!(points[1].position, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(points[1].index, 1);
        assert_eq!(points[2].index, 2);
    }

    #[test]
    fn test_bounds_ignore_disabled() {
        let mut cloud = InMemoryCloud::new(test_positions(), LodSettings::default()).unwrap();
        cloud.set_enabled(3, false);
        let bounds = cloud.bounds();
        assert_eq!(bounds.max, Vec3::splat(2.0));
    }

    #[test]
    fn test_settings_serde_round_trip() {
        let settings = LodSettings {
            lod_count: 3,
            distance_thresholds: vec![10.0, 20.0, 40.0],
            reduction: 0.25,
            minimum_node_point_count: 16,
            uses_sprites: true,
            single_poly_sprite_min_lod: 1,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: LodSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lod_count, 3);
        assert_eq!(back.distance_thresholds, settings.distance_thresholds);
        assert!(back.uses_sprites);
        assert_eq!(back.single_poly_sprite_min_lod, 1);
    }
}
