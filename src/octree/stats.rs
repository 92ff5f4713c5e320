//! Per-level build statistics, diagnostics only

use std::fmt;

/// Aggregate over the data-holding cells of one tree level.
#[derive(Clone, Copy, Debug)]
pub struct LevelStats {
    /// Cells that store render data at this level
    pub cells: u32,
    /// Points claimed across those cells
    pub total_points: u64,
    /// Smallest per-cell point count (u32::MAX while no cell recorded)
    pub min_points: u32,
    /// Largest per-cell point count
    pub max_points: u32,
    /// Render primitives across those cells
    pub total_primitives: u64,
}

impl Default for LevelStats {
    fn default() -> Self {
        Self {
            cells: 0,
            total_points: 0,
            min_points: u32::MAX,
            max_points: 0,
            total_primitives: 0,
        }
    }
}

impl LevelStats {
    /// Fold one cell into the aggregate.
    pub fn record_cell(&mut self, point_count: usize, primitives: u32) {
        self.cells += 1;
        self.total_points += point_count as u64;
        self.min_points = self.min_points.min(point_count as u32);
        self.max_points = self.max_points.max(point_count as u32);
        self.total_primitives += primitives as u64;
    }
}

impl fmt::Display for LevelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cells == 0 {
            return write!(f, "0 cells");
        }
        write!(
            f,
            "{} cells, {} points (min {}, max {}), {} primitives",
            self.cells, self.total_points, self.min_points, self.max_points,
            self.total_primitives
        )
    }
}
