//! Scene light descriptions
//!
//! The subset of a scene light that the shadow scheduler and the light
//! enumeration pass read. These are plain values filled in by the scene
//! collaborator each frame.

use serde::{Deserialize, Serialize};
use umbra_math::{Mat4, Vec3};

/// Light type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    #[default]
    Directional,
    Spot,
    Point,
}

/// Dynamic shadow casting mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowMode {
    #[default]
    None,
    Hard,
    Soft,
}

/// How the light contributes to baked lighting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightBakeType {
    #[default]
    Realtime,
    Mixed,
    Baked,
}

/// Mixed lighting mode of the baked scene
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixedLightingMode {
    #[default]
    IndirectOnly,
    Shadowmask,
    Subtractive,
}

/// Result of the last bake for a light
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightBakingOutput {
    pub bake_type: LightBakeType,
    pub mixed_mode: MixedLightingMode,
    /// Shadow-mask channel (0-3), or -1 when none was assigned
    pub occlusion_mask_channel: i32,
}

impl Default for LightBakingOutput {
    fn default() -> Self {
        Self {
            bake_type: LightBakeType::Realtime,
            mixed_mode: MixedLightingMode::IndirectOnly,
            occlusion_mask_channel: -1,
        }
    }
}

impl LightBakingOutput {
    /// Mixed light baked into a shadow mask
    pub fn mixed_shadowmask(channel: i32) -> Self {
        Self {
            bake_type: LightBakeType::Mixed,
            mixed_mode: MixedLightingMode::Shadowmask,
            occlusion_mask_channel: channel,
        }
    }

    pub fn uses_shadow_mask(&self) -> bool {
        self.bake_type == LightBakeType::Mixed && self.mixed_mode == MixedLightingMode::Shadowmask
    }
}

/// Shadow-related light parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub kind: LightKind,
    pub shadows: ShadowMode,
    /// Shadow strength (0-1)
    pub shadow_strength: f32,
    /// Slope-scale depth bias
    pub shadow_bias: f32,
    pub shadow_normal_bias: f32,
    /// Near plane offset for directional shadow pancaking
    pub shadow_near_plane: f32,
    /// Inner cone angle in degrees (spot lights)
    pub inner_spot_angle: f32,
    pub baking: LightBakingOutput,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            shadows: ShadowMode::None,
            shadow_strength: 1.0,
            shadow_bias: 0.0,
            shadow_normal_bias: 0.0,
            shadow_near_plane: 0.2,
            inner_spot_angle: 21.8,
            baking: LightBakingOutput::default(),
        }
    }
}

impl Light {
    pub fn directional() -> Self {
        Self::default()
    }

    pub fn spot() -> Self {
        Self {
            kind: LightKind::Spot,
            ..Self::default()
        }
    }

    pub fn point() -> Self {
        Self {
            kind: LightKind::Point,
            ..Self::default()
        }
    }

    /// Enable hard shadows at `strength`
    pub fn with_shadows(mut self, strength: f32) -> Self {
        self.shadows = ShadowMode::Hard;
        self.shadow_strength = strength;
        self
    }

    pub fn with_baking(mut self, baking: LightBakingOutput) -> Self {
        self.baking = baking;
        self
    }

    /// True when the light wants a dynamic shadow map at all
    pub fn casts_shadows(&self) -> bool {
        self.shadows != ShadowMode::None && self.shadow_strength > 0.0
    }
}

/// A light that survived camera culling this frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleLight {
    pub light: Light,
    /// Color premultiplied by intensity (linear RGB)
    pub final_color: Vec3,
    pub local_to_world: Mat4,
    pub range: f32,
    /// Outer cone angle in degrees (spot lights)
    pub spot_angle: f32,
}

impl VisibleLight {
    pub fn new(light: Light, final_color: Vec3, local_to_world: Mat4) -> Self {
        Self {
            light,
            final_color,
            local_to_world,
            range: 10.0,
            spot_angle: 30.0,
        }
    }

    /// World-space direction the light shines in (the -Z axis of its transform)
    pub fn direction(&self) -> Vec3 {
        -self.local_to_world.cols[2].truncate()
    }

    /// World-space position
    pub fn position(&self) -> Vec3 {
        self.local_to_world.cols[3].truncate()
    }
}
