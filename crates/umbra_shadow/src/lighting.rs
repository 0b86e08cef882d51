//! Light enumeration pass
//!
//! Walks the visible lights of a camera in order, packs their shading
//! data into GPU-ready structures and reserves shadow tiles for them on
//! the way. Visiting order is the reservation order, so the shadow
//! indices handed to the shader stay stable as long as the visible
//! light list does.
//!
//! # Light Limits
//!
//! - Directional lights: 4
//! - Spot and point lights: 64, sharing one array
//!
//! Lights past a limit are skipped entirely and reserve nothing.

use alloc::vec::Vec;
use log::debug;
use serde::{Deserialize, Serialize};
use umbra_math::{radians, Vec4};

use crate::backend::ShadowCulling;
use crate::light::{LightKind, VisibleLight};
use crate::scheduler::ShadowReservations;

/// Maximum directional lights (uniform buffer, small count)
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
/// Maximum spot and point lights
pub const MAX_OTHER_LIGHTS: usize = 64;

/// Lower bound on squared range, keeps the attenuation term finite
const MIN_RANGE_SQUARED: f32 = 0.00001;
/// Lower bound on the spot cone falloff width
const MIN_SPOT_ANGLE_RANGE: f32 = 0.001;

/// GPU-ready directional light data
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod,
    bytemuck::Zeroable,
)]
pub struct GpuDirectionalLight {
    /// Light color (linear RGB), w unused
    pub color: [f32; 4],
    /// Direction the light travels (normalized, world space)
    pub direction: [f32; 4],
    /// Encoded shadow reservation
    pub shadow_data: [f32; 4],
}

/// GPU-ready spot or point light data
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod,
    bytemuck::Zeroable,
)]
pub struct GpuOtherLight {
    /// Light color (linear RGB), w unused
    pub color: [f32; 4],
    /// World position, w = 1 / range²
    pub position: [f32; 4],
    /// Spot direction (zero for point lights)
    pub direction: [f32; 4],
    /// Cone falloff scale and offset; (0, 1) for point lights
    pub spot_angle: [f32; 4],
    /// Encoded shadow reservation
    pub shadow_data: [f32; 4],
}

impl GpuOtherLight {
    /// Size in bytes (must be 16-byte aligned)
    pub const SIZE: usize = core::mem::size_of::<Self>();
}

/// Light counts for the shader
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, bytemuck::Pod,
    bytemuck::Zeroable,
)]
pub struct LightCounts {
    pub directional_count: u32,
    pub other_count: u32,
    pub _pad: [u32; 2],
}

/// Fixed-size light block, uploaded in one piece
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    pub counts: LightCounts,
    pub directional: [GpuDirectionalLight; MAX_DIRECTIONAL_LIGHTS],
    pub other: [GpuOtherLight; MAX_OTHER_LIGHTS],
}

impl LightUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Light buffer statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBufferStats {
    /// Directional lights added
    pub directional_count: u32,
    /// Spot and point lights added
    pub other_count: u32,
    /// Lights over limit (dropped)
    pub overflow_count: u32,
}

/// CPU-side light buffer for collecting lights before GPU upload
#[derive(Clone, Debug, Default)]
pub struct LightBuffer {
    pub directional_lights: Vec<GpuDirectionalLight>,
    pub other_lights: Vec<GpuOtherLight>,
    frame: u64,
    stats: LightBufferStats,
}

impl LightBuffer {
    pub fn new() -> Self {
        Self {
            directional_lights: Vec::with_capacity(MAX_DIRECTIONAL_LIGHTS),
            other_lights: Vec::with_capacity(MAX_OTHER_LIGHTS),
            frame: 0,
            stats: LightBufferStats::default(),
        }
    }

    /// Clear all lights for new frame
    pub fn clear(&mut self) {
        self.directional_lights.clear();
        self.other_lights.clear();
        self.stats = LightBufferStats::default();
    }

    /// Begin a new frame
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.clear();
    }

    pub fn has_directional_room(&self) -> bool {
        self.directional_lights.len() < MAX_DIRECTIONAL_LIGHTS
    }

    pub fn has_other_room(&self) -> bool {
        self.other_lights.len() < MAX_OTHER_LIGHTS
    }

    /// Add a directional light
    ///
    /// Returns true if added, false if at limit.
    pub fn add_directional(&mut self, light: GpuDirectionalLight) -> bool {
        if !self.has_directional_room() {
            self.stats.overflow_count += 1;
            return false;
        }
        self.directional_lights.push(light);
        self.stats.directional_count += 1;
        true
    }

    /// Add a spot or point light
    pub fn add_other(&mut self, light: GpuOtherLight) -> bool {
        if !self.has_other_room() {
            self.stats.overflow_count += 1;
            return false;
        }
        self.other_lights.push(light);
        self.stats.other_count += 1;
        true
    }

    /// Record a light dropped for lack of room
    pub fn note_overflow(&mut self) {
        self.stats.overflow_count += 1;
    }

    pub fn counts(&self) -> LightCounts {
        LightCounts {
            directional_count: self.directional_lights.len() as u32,
            other_count: self.other_lights.len() as u32,
            _pad: [0; 2],
        }
    }

    /// Pack the lights into the fixed-size upload block
    pub fn uniforms(&self) -> LightUniforms {
        let mut uniforms: LightUniforms = bytemuck::Zeroable::zeroed();
        uniforms.counts = self.counts();
        uniforms.directional[..self.directional_lights.len()]
            .copy_from_slice(&self.directional_lights);
        uniforms.other[..self.other_lights.len()].copy_from_slice(&self.other_lights);
        uniforms
    }

    /// Get directional lights as bytes for GPU upload
    pub fn directional_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.directional_lights)
    }

    /// Get spot and point lights as bytes for GPU upload
    pub fn other_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.other_lights)
    }

    pub fn stats(&self) -> &LightBufferStats {
        &self.stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Cone falloff parameters `(1 / (cos_inner - cos_outer), -cos_outer / (cos_inner - cos_outer))`
pub fn spot_angles(inner_angle: f32, outer_angle: f32) -> [f32; 2] {
    let inner_cos = radians(0.5 * inner_angle).cos();
    let outer_cos = radians(0.5 * outer_angle).cos();
    let angle_range_inv = 1.0 / (inner_cos - outer_cos).max(MIN_SPOT_ANGLE_RANGE);
    [angle_range_inv, -outer_cos * angle_range_inv]
}

/// Per-camera light setup feeding the shadow scheduler
#[derive(Clone, Debug, Default)]
pub struct Lighting {
    buffer: LightBuffer,
}

impl Lighting {
    pub fn new() -> Self {
        Self {
            buffer: LightBuffer::new(),
        }
    }

    pub fn buffer(&self) -> &LightBuffer {
        &self.buffer
    }

    /// Collect `visible_lights` and reserve their shadows
    pub fn setup<C: ShadowCulling + ?Sized>(
        &mut self,
        reservations: &mut ShadowReservations<'_, C>,
        visible_lights: &[VisibleLight],
    ) {
        self.buffer.begin_frame();

        for (index, visible) in visible_lights.iter().enumerate() {
            match visible.light.kind {
                LightKind::Directional => {
                    if !self.buffer.has_directional_room() {
                        self.buffer.note_overflow();
                        continue;
                    }
                    let shadow_data = reservations.reserve_directional(&visible.light, index);
                    self.buffer.add_directional(GpuDirectionalLight {
                        color: visible.final_color.extend(0.0).to_array(),
                        direction: visible.direction().extend(0.0).to_array(),
                        shadow_data: shadow_data.to_array(),
                    });
                }
                LightKind::Point | LightKind::Spot => {
                    if !self.buffer.has_other_room() {
                        self.buffer.note_overflow();
                        continue;
                    }
                    let shadow_data = reservations.reserve_other(&visible.light, index);
                    self.buffer.add_other(other_light(visible, shadow_data));
                }
            }
        }

        let stats = self.buffer.stats();
        debug!(
            "Lighting frame {}: {} directional, {} other, {} dropped",
            self.buffer.frame(),
            stats.directional_count,
            stats.other_count,
            stats.overflow_count
        );
    }

    pub fn uniforms(&self) -> LightUniforms {
        self.buffer.uniforms()
    }
}

/// Shading data for a spot or point light
fn other_light(visible: &VisibleLight, shadow_data: Vec4) -> GpuOtherLight {
    let range_squared = (visible.range * visible.range).max(MIN_RANGE_SQUARED);
    let position = visible.position().extend(1.0 / range_squared);

    let (direction, spot_angle) = match visible.light.kind {
        LightKind::Spot => (
            visible.direction().extend(0.0).to_array(),
            spot_angles(visible.light.inner_spot_angle, visible.spot_angle),
        ),
        _ => ([0.0; 4], [0.0, 1.0]),
    };

    GpuOtherLight {
        color: visible.final_color.extend(0.0).to_array(),
        position: position.to_array(),
        direction,
        spot_angle: [spot_angle[0], spot_angle[1], 0.0, 0.0],
        shadow_data: shadow_data.to_array(),
    }
}
