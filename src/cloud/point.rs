//! Point record shared with the renderer's vertex buffer

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;

/// Single enabled point - exactly 16 bytes
///
/// `index` is the point's slot in the renderer's vertex buffer (the enabled
/// list); index buffer caches refer to it directly. In sprite mode each
/// point occupies vertex slots `index * 4 .. index * 4 + 4`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CloudPoint {
    /// World-space position
    pub position: Vec3,
    /// Vertex buffer slot
    pub index: u32,
}

impl CloudPoint {
    pub fn new(position: Vec3, index: u32) -> Self {
        Self { position, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_layout() {
        assert_eq!(std::mem::size_of::<CloudPoint>(), 16);
    }

    #[test]
    fn test_pod_cast() {
        let points = [
            CloudPoint::new(Vec3::new(1.0, 2.0, 3.0), 0),
            CloudPoint::new(Vec3::new(4.0, 5.0, 6.0), 1),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&points);
        assert_eq!(bytes.len(), 32);
    }
}
