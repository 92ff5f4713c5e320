//! Build-time point reservation map.
//!
//! Marks, per point and per tree depth, whether the point has already been
//! claimed by a cell at that depth. Only points on octant faces are ever in
//! contention (a point strictly inside a box is inside exactly one octant),
//! and only during a build; the map is dropped before `rebuild` returns.

use std::sync::atomic::{AtomicU16, Ordering};

/// Deepest level the 16-bit flag field can track. Depth 0 (the root) has no
/// siblings and is never recorded, so bit `d - 1` covers depths 1..=16.
pub const MAX_RESERVATION_DEPTH: u32 = 16;

/// One atomic flag set per enabled point, one bit per depth.
///
/// Loads are relaxed and optimistic; claims that must be exclusive are
/// serialized by the build mutex and re-validated there, so the atomics only
/// need to be data-race free, not ordered.
pub struct ReservationMap {
    flags: Vec<AtomicU16>,
}

impl ReservationMap {
    /// Create a zeroed map for `point_count` points.
    pub fn new(point_count: usize) -> Self {
        let mut flags = Vec::with_capacity(point_count);
        flags.resize_with(point_count, || AtomicU16::new(0));
        Self { flags }
    }

    fn mask(depth: u32) -> u16 {
        debug_assert!(depth >= 1 && depth <= MAX_RESERVATION_DEPTH);
        1 << (depth - 1)
    }

    /// Has this point been claimed by some cell at `depth`?
    pub fn is_reserved(&self, point: u32, depth: u32) -> bool {
        self.flags[point as usize].load(Ordering::Relaxed) & Self::mask(depth) != 0
    }

    /// Claim this point for a cell at `depth`.
    pub fn reserve(&self, point: u32, depth: u32) {
        self.flags[point as usize].fetch_or(Self::mask(depth), Ordering::Relaxed);
    }

    /// Number of tracked points.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
