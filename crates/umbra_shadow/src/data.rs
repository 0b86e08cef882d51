//! GPU Shadow Data Structures
//!
//! The frame-scoped uniform payload produced by the shadow pass. Every
//! array is fixed-size and bytemuck Pod, so each can be uploaded as-is.

use serde::{Deserialize, Serialize};
use umbra_math::{Mat4, Vec2, Vec4};

use crate::config::MAX_CASCADES;
use crate::ledger::{MAX_SHADOWED_DIRECTIONAL_LIGHTS, MAX_SHADOWED_OTHER_TILES};
use crate::variants::ShadowVariants;

/// Directional atlas tiles: every light times every cascade
pub const MAX_DIRECTIONAL_TILES: usize = MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES;

/// Global shadow uniforms
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod,
    bytemuck::Zeroable,
)]
pub struct ShadowGlobals {
    /// Directional size, 1 / directional size, other size, 1 / other size
    pub atlas_size: [f32; 4],

    /// 1 / max distance, 1 / distance fade, cascade fade term
    pub distance_fade: [f32; 4],

    /// Active cascades, 0 when no directional light is shadowed
    pub cascade_count: i32,

    /// Padding to align to 16 bytes
    pub _pad: [i32; 3],
}

impl ShadowGlobals {
    /// Size in bytes (must be 16-byte aligned)
    pub const SIZE: usize = core::mem::size_of::<Self>();
}

/// Everything the shading stage needs to sample this frame's shadows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowUniforms {
    pub globals: ShadowGlobals,

    /// Atlas matrices indexed by directional tile
    pub directional_matrices: [[[f32; 4]; 4]; MAX_DIRECTIONAL_TILES],

    /// Atlas matrices indexed by other-light tile
    pub other_matrices: [[[f32; 4]; 4]; MAX_SHADOWED_OTHER_TILES],

    /// Squared-radius culling spheres per cascade
    pub cascade_culling_spheres: [[f32; 4]; MAX_CASCADES],

    /// 1 / radius and filter footprint per cascade
    pub cascade_data: [[f32; 4]; MAX_CASCADES],

    /// Border-adjusted offset, scale and normal bias per other-light tile
    pub other_tiles: [[f32; 4]; MAX_SHADOWED_OTHER_TILES],

    /// Keyword selections for the shading backend
    pub variants: ShadowVariants,
}

impl ShadowUniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every table and disable every variant
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set_directional_matrix(&mut self, tile: usize, matrix: &Mat4) {
        debug_assert!(tile < MAX_DIRECTIONAL_TILES, "directional tile {} out of range", tile);
        self.directional_matrices[tile] = matrix.to_cols_array_2d();
    }

    pub fn set_other_matrix(&mut self, tile: usize, matrix: &Mat4) {
        debug_assert!(tile < MAX_SHADOWED_OTHER_TILES, "other tile {} out of range", tile);
        self.other_matrices[tile] = matrix.to_cols_array_2d();
    }

    /// Store sampling bounds for an other-light tile.
    ///
    /// The tile is inset by half a texel on every side so filtering
    /// never reads a neighbouring tile.
    pub fn set_other_tile(&mut self, tile: usize, offset: Vec2, scale: f32, bias: f32) {
        debug_assert!(tile < MAX_SHADOWED_OTHER_TILES, "other tile {} out of range", tile);
        let border = self.globals.atlas_size[3] * 0.5;
        self.other_tiles[tile] = Vec4::new(
            offset.x * scale + border,
            offset.y * scale + border,
            scale - border - border,
            bias,
        )
        .to_array();
    }

    /// Record the directional atlas dimension
    pub fn set_directional_atlas_size(&mut self, size: u32) {
        let size = size as f32;
        self.globals.atlas_size[0] = size;
        self.globals.atlas_size[1] = 1.0 / size;
    }

    /// Record the other-light atlas dimension
    pub fn set_other_atlas_size(&mut self, size: u32) {
        let size = size as f32;
        self.globals.atlas_size[2] = size;
        self.globals.atlas_size[3] = 1.0 / size;
    }

    pub fn directional_matrix(&self, tile: usize) -> Mat4 {
        let [c0, c1, c2, c3] = self.directional_matrices[tile];
        Mat4::from_cols(c0.into(), c1.into(), c2.into(), c3.into())
    }

    pub fn other_matrix(&self, tile: usize) -> Mat4 {
        let [c0, c1, c2, c3] = self.other_matrices[tile];
        Mat4::from_cols(c0.into(), c1.into(), c2.into(), c3.into())
    }

    /// Get global uniforms as bytes
    pub fn globals_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.globals)
    }

    /// Get directional matrices as bytes
    pub fn directional_matrices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.directional_matrices[..])
    }

    /// Get other-light matrices as bytes
    pub fn other_matrices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.other_matrices[..])
    }

    /// Get cascade spheres followed by cascade data as bytes
    pub fn cascade_bytes(&self) -> [&[u8]; 2] {
        [
            bytemuck::cast_slice(&self.cascade_culling_spheres[..]),
            bytemuck::cast_slice(&self.cascade_data[..]),
        ]
    }

    /// Get other-light tile vectors as bytes
    pub fn other_tiles_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.other_tiles[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_sizes() {
        assert_eq!(ShadowGlobals::SIZE, 48);
        assert_eq!(ShadowGlobals::SIZE % 16, 0);

        let uniforms = ShadowUniforms::new();
        assert_eq!(uniforms.directional_matrices_bytes().len(), 16 * 64);
        assert_eq!(uniforms.other_matrices_bytes().len(), 16 * 64);
        assert_eq!(uniforms.other_tiles_bytes().len(), 16 * 16);
        assert_eq!(uniforms.cascade_bytes()[0].len(), 64);
    }

    #[test]
    fn test_other_tile_border() {
        let mut uniforms = ShadowUniforms::new();
        uniforms.set_other_atlas_size(1024);
        uniforms.set_other_tile(5, Vec2::new(1.0, 1.0), 0.25, 0.02);

        let border = 0.5 / 1024.0;
        let tile = uniforms.other_tiles[5];
        assert!((tile[0] - (0.25 + border)).abs() < 1e-7);
        assert!((tile[1] - (0.25 + border)).abs() < 1e-7);
        assert!((tile[2] - (0.25 - 2.0 * border)).abs() < 1e-7);
        assert_eq!(tile[3], 0.02);
    }

    #[test]
    fn test_matrix_storage_is_column_major() {
        let mut uniforms = ShadowUniforms::new();
        let m = Mat4::from_translation(umbra_math::Vec3::new(1.0, 2.0, 3.0));
        uniforms.set_directional_matrix(7, &m);

        assert_eq!(uniforms.directional_matrices[7][3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniforms.directional_matrix(7), m);
    }

    #[test]
    fn test_clear_resets_variants() {
        let mut uniforms = ShadowUniforms::new();
        uniforms.globals.cascade_count = 4;
        uniforms.clear();
        assert_eq!(uniforms.globals.cascade_count, 0);
        assert!(uniforms.variants.enabled_keywords().is_empty());
    }
}
