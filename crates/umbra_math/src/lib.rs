//! # umbra_math - Shadow Math Primitives
//!
//! The vector and matrix types shared by the shadow scheduler.
//! Matrices are column-major, but expose row accessors because the
//! atlas conversions are naturally expressed per clip-space row.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod vector;
pub mod matrix;

pub use vector::*;
pub use matrix::*;

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const DEG_TO_RAD: f32 = PI / 180.0;
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
    pub const SQRT_2: f32 = core::f32::consts::SQRT_2;
    pub const EPSILON: f32 = 1e-6;
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * consts::DEG_TO_RAD
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians * consts::RAD_TO_DEG
}

/// Approximate float equality within `epsilon`
#[inline]
pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() <= epsilon
}

pub mod prelude {
    pub use crate::vector::{Vec2, Vec3, Vec4};
    pub use crate::matrix::Mat4;
    pub use crate::{radians, degrees, approx_eq};
}
