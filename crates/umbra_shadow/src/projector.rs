//! Atlas-space shadow matrices
//!
//! Turns a light's clip-space view-projection into a matrix that maps
//! world positions straight to atlas texture coordinates and [0, 1]
//! depth, so the shading stage samples the packed atlas without knowing
//! how it was packed.

use umbra_math::{Mat4, Vec2};

/// Convert `view_proj` so that it lands in the tile at `offset` (in
/// tiles) of an atlas where each tile spans `scale` of the full width.
///
/// When the platform uses a reversed depth buffer, the Z row is negated
/// first so stored depths compare the same way on every backend.
pub fn to_atlas_matrix(view_proj: &Mat4, offset: Vec2, scale: f32, reversed_z: bool) -> Mat4 {
    let mut m = *view_proj;

    if reversed_z {
        m.set_row(2, -m.row(2));
    }

    let row0 = m.row(0);
    let row1 = m.row(1);
    let row2 = m.row(2);
    let row3 = m.row(3);

    m.set_row(0, ((row0 + row3) * 0.5 + row3 * offset.x) * scale);
    m.set_row(1, ((row1 + row3) * 0.5 + row3 * offset.y) * scale);
    m.set_row(2, (row2 + row3) * 0.5);

    m
}
