//! Matrix types for transformations

use crate::vector::{Vec3, Vec4};
use core::ops::{Mul, MulAssign};

/// 4x4 matrix (column-major)
///
/// Storage is by column, matching GPU uniform layout. Clip-space remaps
/// operate on rows, so [`Mat4::row`] and [`Mat4::set_row`] are provided.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C, align(16))]
pub struct Mat4 {
    pub cols: [Vec4; 4],
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO],
    };

    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self { cols: [c0, c1, c2, c3] }
    }

    #[inline]
    pub fn from_rows(r0: Vec4, r1: Vec4, r2: Vec4, r3: Vec4) -> Self {
        Self::from_cols(r0, r1, r2, r3).transpose()
    }

    /// Element at `row`, `col`
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        match row {
            0 => self.cols[col].x,
            1 => self.cols[col].y,
            2 => self.cols[col].z,
            _ => self.cols[col].w,
        }
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let c = &mut self.cols[col];
        match row {
            0 => c.x = value,
            1 => c.y = value,
            2 => c.z = value,
            _ => c.w = value,
        }
    }

    /// Row `index` as a vector of its four column entries
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.get(index, 0),
            self.get(index, 1),
            self.get(index, 2),
            self.get(index, 3),
        )
    }

    #[inline]
    pub fn set_row(&mut self, index: usize, row: Vec4) {
        self.set(index, 0, row.x);
        self.set(index, 1, row.y);
        self.set(index, 2, row.z);
        self.set(index, 3, row.w);
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, translation.extend(1.0))
    }

    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    /// Create a right-handed look-at view matrix
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - eye).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        Self::from_cols(
            Vec4::new(right.x, up.x, -forward.x, 0.0),
            Vec4::new(right.y, up.y, -forward.y, 0.0),
            Vec4::new(right.z, up.z, -forward.z, 0.0),
            Vec4::new(-right.dot(eye), -up.dot(eye), forward.dot(eye), 1.0),
        )
    }

    /// Create a perspective projection matrix (clip depth [-1, 1])
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y / 2.0).tan();
        let nf = 1.0 / (near - far);

        Self::from_cols(
            Vec4::new(f / aspect, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, (far + near) * nf, -1.0),
            Vec4::new(0.0, 0.0, 2.0 * far * near * nf, 0.0),
        )
    }

    /// Create an orthographic projection matrix (clip depth [-1, 1])
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let rml = right - left;
        let tmb = top - bottom;
        let fmn = far - near;

        Self::from_cols(
            Vec4::new(2.0 / rml, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tmb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 / fmn, 0.0),
            Vec4::new(-(right + left) / rml, -(top + bottom) / tmb, -(far + near) / fmn, 1.0),
        )
    }

    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// Transform a point (w=1), with perspective divide
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        let v = *self * point.extend(1.0);
        v.truncate() / v.w
    }

    /// Convert to 2D array (column-major) for GPU uniforms
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl MulAssign for Mat4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
