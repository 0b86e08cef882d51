//! Shadow Configuration
//!
//! Pipeline-wide shadow settings with serde support, so they can be
//! loaded from JSON and hot-reloaded alongside the rest of the pipeline
//! asset.

use serde::{Deserialize, Serialize};
use umbra_math::Vec3;

use crate::error::ShadowConfigError;

/// Maximum number of cascades a directional light can be split into
pub const MAX_CASCADES: usize = 4;

/// Side length of a square shadow atlas, in texels
///
/// Restricted to powers of two so that dividing the atlas into 1x1, 2x2
/// or 4x4 tiles is always exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AtlasSize {
    Size256,
    Size512,
    Size1024,
    Size2048,
    Size4096,
    Size8192,
}

impl AtlasSize {
    pub fn texels(self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
            Self::Size1024 => 1024,
            Self::Size2048 => 2048,
            Self::Size4096 => 4096,
            Self::Size8192 => 8192,
        }
    }
}

impl Default for AtlasSize {
    fn default() -> Self {
        Self::Size1024
    }
}

impl TryFrom<u32> for AtlasSize {
    type Error = ShadowConfigError;

    fn try_from(texels: u32) -> Result<Self, Self::Error> {
        Ok(match texels {
            256 => Self::Size256,
            512 => Self::Size512,
            1024 => Self::Size1024,
            2048 => Self::Size2048,
            4096 => Self::Size4096,
            8192 => Self::Size8192,
            other => return Err(ShadowConfigError::InvalidAtlasSize(other)),
        })
    }
}

impl From<AtlasSize> for u32 {
    fn from(size: AtlasSize) -> u32 {
        size.texels()
    }
}

/// PCF filter kernel used when sampling a shadow atlas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Pcf2x2,
    Pcf3x3,
    Pcf5x5,
    Pcf7x7,
}

impl FilterMode {
    /// 0 for 2x2 up to 3 for 7x7; the filter footprint is `index + 1` texels
    pub fn filter_quality_index(self) -> u32 {
        match self {
            Self::Pcf2x2 => 0,
            Self::Pcf3x3 => 1,
            Self::Pcf5x5 => 2,
            Self::Pcf7x7 => 3,
        }
    }
}

/// How the shading stage transitions between directional cascades
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadeBlendMode {
    #[default]
    Hard,
    Soft,
    Dither,
}

/// Project-wide shadow-mask quality mode for mixed lights
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowMaskMode {
    /// Baked shadows everywhere, dynamic shadows only for dynamic casters
    Always,
    /// Baked shadows only beyond the shadow distance
    #[default]
    Distance,
}

/// Directional light shadow settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalShadowSettings {
    /// Directional atlas resolution
    pub atlas_size: AtlasSize,

    /// PCF kernel for directional shadows
    pub filter: FilterMode,

    /// Number of cascades per directional light (1-4)
    pub cascade_count: u32,

    /// Cascade split ratios relative to the shadow distance
    pub cascade_ratios: [f32; 3],

    /// Fraction of the last cascade used to fade shadows out
    pub cascade_fade: f32,

    /// Cascade transition mode
    pub cascade_blend: CascadeBlendMode,
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: AtlasSize::Size1024,
            filter: FilterMode::Pcf2x2,
            cascade_count: 4,
            cascade_ratios: [0.1, 0.25, 0.5],
            cascade_fade: 0.1,
            cascade_blend: CascadeBlendMode::Hard,
        }
    }
}

impl DirectionalShadowSettings {
    /// Cascade ratios in the shape the culling collaborator expects
    pub fn cascade_ratios_vec(&self) -> Vec3 {
        let [a, b, c] = self.cascade_ratios;
        Vec3::new(a, b, c)
    }

    /// Cascade count as a table index bound
    pub fn cascade_count(&self) -> usize {
        self.cascade_count as usize
    }
}

/// Spot and point light shadow settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherShadowSettings {
    /// Other-light atlas resolution
    pub atlas_size: AtlasSize,

    /// PCF kernel for spot and point shadows
    pub filter: FilterMode,
}

/// Global shadow configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Maximum shadow distance from the camera
    pub max_distance: f32,

    /// Fraction of `max_distance` over which shadows fade out
    pub distance_fade: f32,

    /// Directional light settings
    pub directional: DirectionalShadowSettings,

    /// Spot and point light settings
    pub other: OtherShadowSettings,

    /// Shadow-mask quality mode
    pub shadow_mask_mode: ShadowMaskMode,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            distance_fade: 0.1,
            directional: DirectionalShadowSettings::default(),
            other: OtherShadowSettings::default(),
            shadow_mask_mode: ShadowMaskMode::Distance,
        }
    }
}

impl ShadowSettings {
    /// Parse settings from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self, ShadowConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> Result<String, ShadowConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every value is in the range the scheduler relies on
    pub fn validate(&self) -> Result<(), ShadowConfigError> {
        let directional = &self.directional;

        if !(1..=MAX_CASCADES as u32).contains(&directional.cascade_count) {
            return Err(ShadowConfigError::InvalidCascadeCount(directional.cascade_count));
        }
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(ShadowConfigError::InvalidDistance(self.max_distance));
        }
        if !(self.distance_fade > 0.0 && self.distance_fade <= 1.0) {
            return Err(ShadowConfigError::InvalidFade {
                name: "distance_fade",
                range: "(0, 1]",
                value: self.distance_fade,
            });
        }
        if !(directional.cascade_fade > 0.0 && directional.cascade_fade < 1.0) {
            return Err(ShadowConfigError::InvalidFade {
                name: "cascade_fade",
                range: "(0, 1)",
                value: directional.cascade_fade,
            });
        }

        let [a, b, c] = directional.cascade_ratios;
        if !(0.0 < a && a < b && b < c && c < 1.0) {
            return Err(ShadowConfigError::InvalidCascadeRatios(directional.cascade_ratios));
        }

        Ok(())
    }
}
