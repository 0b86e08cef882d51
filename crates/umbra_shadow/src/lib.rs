//! # umbra_shadow - Shadow Atlas Scheduling
//!
//! Host-side shadow mapping for a forward renderer: decides each frame
//! which lights get a shadow map, packs those maps into two depth
//! atlases and produces the uniforms the shading stage samples them
//! with.
//!
//! ## Architecture
//!
//! - **Config**: pipeline-wide shadow settings, loadable from JSON
//! - **Ledger**: bounded per-frame reservations (4 directional, 16 other tiles)
//! - **Packer**: 1x1, 2x2 or 4x4 tile grids and tile viewports
//! - **Cascade**: culling spheres, filter footprints and distance fade
//! - **Projector**: light clip space to atlas space matrices
//! - **Variants**: exactly-one-of-N shader keyword selection
//! - **Scheduler**: the setup, reserve, render, cleanup frame cycle
//! - **Lighting**: the visible light pass that drives reservations
//!
//! Rasterization and culling stay outside the crate, behind the
//! [`ShadowBackend`] and [`ShadowCulling`] traits.
//!
//! ## Example
//!
//! ```ignore
//! use umbra_shadow::prelude::*;
//!
//! let settings = ShadowSettings::from_json(&pipeline_json)?;
//! let mut scheduler = ShadowScheduler::new();
//! let mut lighting = Lighting::new();
//!
//! // Per frame
//! let mut reservations = scheduler.setup(&culling, &settings);
//! lighting.setup(&mut reservations, &visible_lights);
//!
//! let rendered = reservations.render(&mut backend);
//! upload(rendered.uniforms(), &lighting.uniforms());
//! // ... draw the scene ...
//! rendered.cleanup(&mut backend);
//! ```

extern crate alloc;

pub mod backend;
pub mod cascade;
pub mod config;
pub mod data;
pub mod error;
pub mod ledger;
pub mod light;
pub mod lighting;
pub mod packer;
pub mod projector;
pub mod scheduler;
pub mod variants;

pub use backend::{
    AtlasTarget, CommandRecorder, CubeFace, LoadOp, ShadowBackend, ShadowCommand, ShadowCulling,
    ShadowDrawSettings, ShadowProjection, ShadowSplitData, StoreOp,
};
pub use cascade::{CascadeRecord, CascadeTable};
pub use config::{
    AtlasSize, CascadeBlendMode, DirectionalShadowSettings, FilterMode, OtherShadowSettings,
    ShadowMaskMode, ShadowSettings, MAX_CASCADES,
};
pub use data::{ShadowGlobals, ShadowUniforms};
pub use error::ShadowConfigError;
pub use ledger::{
    DirectionalShadowRequest, OtherShadowRequest, ReservationLedger, DISABLED_SHADOW_DATA,
};
pub use light::{
    Light, LightBakeType, LightBakingOutput, LightKind, MixedLightingMode, ShadowMode, VisibleLight,
};
pub use lighting::{LightBuffer, LightUniforms, Lighting};
pub use packer::{AtlasLayout, TileRect, TileViewport};
pub use projector::to_atlas_matrix;
pub use scheduler::{FramePhase, RenderedShadows, ShadowReservations, ShadowScheduler};
pub use variants::{ShaderVariantGroup, ShadowVariants, VariantSelection};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::backend::{CommandRecorder, ShadowBackend, ShadowCulling, ShadowProjection};
    pub use crate::config::ShadowSettings;
    pub use crate::light::{Light, VisibleLight};
    pub use crate::lighting::Lighting;
    pub use crate::scheduler::{FramePhase, ShadowScheduler};
}
