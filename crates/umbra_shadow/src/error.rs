//! Error types for shadow configuration

use thiserror::Error;

/// Errors raised while loading or validating [`ShadowSettings`](crate::config::ShadowSettings)
#[derive(Debug, Error)]
pub enum ShadowConfigError {
    #[error("Failed to parse shadow settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Atlas size {0} is not a supported power of two (256..=8192)")]
    InvalidAtlasSize(u32),

    #[error("Cascade count {0} is out of range (1..=4)")]
    InvalidCascadeCount(u32),

    #[error("Shadow distance must be positive and finite, got {0}")]
    InvalidDistance(f32),

    #[error("{name} must lie in {range}, got {value}")]
    InvalidFade {
        name: &'static str,
        range: &'static str,
        value: f32,
    },

    #[error("Cascade ratios must be strictly increasing within (0, 1), got {0:?}")]
    InvalidCascadeRatios([f32; 3]),
}
