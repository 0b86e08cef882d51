//! Culling and rasterization seams
//!
//! The scheduler never touches a GPU or a scene directly. It asks a
//! [`ShadowCulling`] implementation for light-space projections and
//! drives a [`ShadowBackend`] with an ordered stream of render-target,
//! viewport and draw calls.
//!
//! [`CommandRecorder`] is a backend that records that stream as
//! [`ShadowCommand`] values, for inspection or deferred replay.

use alloc::string::String;
use alloc::vec::Vec;
use umbra_math::{Mat4, Vec3, Vec4};

use crate::packer::TileRect;

/// The two transient shadow atlases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtlasTarget {
    Directional,
    Other,
}

impl AtlasTarget {
    /// Shader-visible texture name
    pub fn name(self) -> &'static str {
        match self {
            Self::Directional => "_DirectionalShadowAtlas",
            Self::Other => "_OtherShadowAtlas",
        }
    }
}

/// Load operation for the atlas attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    /// Clear to a value
    Clear,
    /// Load existing contents
    Load,
    /// Don't care (undefined)
    DontCare,
}

/// Store operation for the atlas attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the result
    Store,
    /// Discard the result
    Discard,
}

/// Culling data for one shadow tile
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowSplitData {
    /// Center in xyz, radius in w (directional cascades only)
    pub culling_sphere: Vec4,
    /// Fraction of the cascade overlap in which casters are still culled
    pub cascade_blend_culling_factor: f32,
}

/// View, projection and split data for one shadow tile
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowProjection {
    pub view: Mat4,
    pub projection: Mat4,
    pub split: ShadowSplitData,
}

impl ShadowProjection {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Cube map face rendered for a point light
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in atlas tile order
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Direction the face looks along
    pub fn forward(self) -> Vec3 {
        match self {
            Self::PositiveX => Vec3::X,
            Self::NegativeX => Vec3::NEG_X,
            Self::PositiveY => Vec3::Y,
            Self::NegativeY => Vec3::NEG_Y,
            Self::PositiveZ => Vec3::Z,
            Self::NegativeZ => Vec3::NEG_Z,
        }
    }
}

/// Which casters a shadow draw renders
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowDrawSettings {
    pub visible_light_index: usize,
    pub split: ShadowSplitData,
}

/// Scene and culling collaborator
pub trait ShadowCulling {
    /// Whether any shadow caster of the light is inside the view
    fn has_shadow_caster_bounds(&self, visible_light_index: usize) -> bool;

    /// Orthographic projection and culling sphere for one cascade
    fn directional_shadow(
        &self,
        visible_light_index: usize,
        cascade_index: usize,
        cascade_count: usize,
        cascade_ratios: Vec3,
        tile_size: u32,
        near_plane_offset: f32,
    ) -> ShadowProjection;

    /// Perspective projection of a spot light cone
    fn spot_shadow(&self, visible_light_index: usize) -> ShadowProjection;

    /// Perspective projection for one cube face of a point light,
    /// with the field of view widened by `fov_bias` degrees
    fn point_shadow(
        &self,
        visible_light_index: usize,
        face: CubeFace,
        fov_bias: f32,
    ) -> ShadowProjection;
}

/// Rasterization collaborator receiving the shadow pass commands
pub trait ShadowBackend {
    /// Whether the platform uses a reversed depth buffer
    fn uses_reversed_z(&self) -> bool;

    /// Allocate a square depth target of `size` texels
    fn get_temporary_depth_target(&mut self, target: AtlasTarget, size: u32);

    fn release_temporary_target(&mut self, target: AtlasTarget);

    /// Bind `source` under the name of `target`
    fn alias_texture(&mut self, target: AtlasTarget, source: AtlasTarget);

    fn set_render_target(&mut self, target: AtlasTarget, load: LoadOp, store: StoreOp);

    fn clear_depth(&mut self);

    fn set_viewport(&mut self, rect: TileRect);

    fn set_view_projection(&mut self, view: &Mat4, projection: &Mat4);

    /// Global depth bias; `(0, 0)` resets it
    fn set_depth_bias(&mut self, bias: f32, slope_bias: f32);

    /// Clamp casters behind the near plane onto it
    fn set_shadow_pancaking(&mut self, enabled: bool);

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings);

    /// Open a profiling scope
    fn begin_sample(&mut self, _name: &str) {}

    fn end_sample(&mut self, _name: &str) {}
}

/// A recorded backend call
#[derive(Clone, Debug, PartialEq)]
pub enum ShadowCommand {
    GetTemporaryDepthTarget { target: AtlasTarget, size: u32 },
    ReleaseTemporaryTarget { target: AtlasTarget },
    AliasTexture { target: AtlasTarget, source: AtlasTarget },
    SetRenderTarget { target: AtlasTarget, load: LoadOp, store: StoreOp },
    ClearDepth,
    SetViewport { rect: TileRect },
    SetViewProjection { view: Mat4, projection: Mat4 },
    SetDepthBias { bias: f32, slope_bias: f32 },
    SetShadowPancaking { enabled: bool },
    DrawShadows { settings: ShadowDrawSettings },
    BeginSample { name: String },
    EndSample { name: String },
}

impl ShadowCommand {
    /// Check if this is a draw
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawShadows { .. })
    }
}

/// Backend that records every call in order
#[derive(Clone, Debug, Default)]
pub struct CommandRecorder {
    reversed_z: bool,
    commands: Vec<ShadowCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder for a platform with a reversed depth buffer
    pub fn with_reversed_z(reversed_z: bool) -> Self {
        Self {
            reversed_z,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[ShadowCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the recorder empty
    pub fn take(&mut self) -> Vec<ShadowCommand> {
        core::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of shadow draws recorded
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Size of the last allocation of `target`, if any
    pub fn allocated_size(&self, target: AtlasTarget) -> Option<u32> {
        self.commands.iter().rev().find_map(|c| match c {
            ShadowCommand::GetTemporaryDepthTarget { target: t, size } if *t == target => {
                Some(*size)
            }
            _ => None,
        })
    }

    /// Whether `target` was released
    pub fn released(&self, target: AtlasTarget) -> bool {
        self.commands
            .iter()
            .any(|c| {
                matches!(c, ShadowCommand::ReleaseTemporaryTarget { target: t } if *t == target)
            })
    }

    /// Viewports in the order they were set
    pub fn viewports(&self) -> Vec<TileRect> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                ShadowCommand::SetViewport { rect } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    /// Replay the recording onto another backend
    pub fn replay<B: ShadowBackend + ?Sized>(&self, backend: &mut B) {
        for command in &self.commands {
            match command {
                ShadowCommand::GetTemporaryDepthTarget { target, size } => {
                    backend.get_temporary_depth_target(*target, *size)
                }
                ShadowCommand::ReleaseTemporaryTarget { target } => {
                    backend.release_temporary_target(*target)
                }
                ShadowCommand::AliasTexture { target, source } => {
                    backend.alias_texture(*target, *source)
                }
                ShadowCommand::SetRenderTarget { target, load, store } => {
                    backend.set_render_target(*target, *load, *store)
                }
                ShadowCommand::ClearDepth => backend.clear_depth(),
                ShadowCommand::SetViewport { rect } => backend.set_viewport(*rect),
                ShadowCommand::SetViewProjection { view, projection } => {
                    backend.set_view_projection(view, projection)
                }
                ShadowCommand::SetDepthBias { bias, slope_bias } => {
                    backend.set_depth_bias(*bias, *slope_bias)
                }
                ShadowCommand::SetShadowPancaking { enabled } => {
                    backend.set_shadow_pancaking(*enabled)
                }
                ShadowCommand::DrawShadows { settings } => backend.draw_shadows(settings),
                ShadowCommand::BeginSample { name } => backend.begin_sample(name),
                ShadowCommand::EndSample { name } => backend.end_sample(name),
            }
        }
    }
}

impl ShadowBackend for CommandRecorder {
    fn uses_reversed_z(&self) -> bool {
        self.reversed_z
    }

    fn get_temporary_depth_target(&mut self, target: AtlasTarget, size: u32) {
        self.commands.push(ShadowCommand::GetTemporaryDepthTarget { target, size });
    }

    fn release_temporary_target(&mut self, target: AtlasTarget) {
        self.commands.push(ShadowCommand::ReleaseTemporaryTarget { target });
    }

    fn alias_texture(&mut self, target: AtlasTarget, source: AtlasTarget) {
        self.commands.push(ShadowCommand::AliasTexture { target, source });
    }

    fn set_render_target(&mut self, target: AtlasTarget, load: LoadOp, store: StoreOp) {
        self.commands.push(ShadowCommand::SetRenderTarget { target, load, store });
    }

    fn clear_depth(&mut self) {
        self.commands.push(ShadowCommand::ClearDepth);
    }

    fn set_viewport(&mut self, rect: TileRect) {
        self.commands.push(ShadowCommand::SetViewport { rect });
    }

    fn set_view_projection(&mut self, view: &Mat4, projection: &Mat4) {
        self.commands.push(ShadowCommand::SetViewProjection {
            view: *view,
            projection: *projection,
        });
    }

    fn set_depth_bias(&mut self, bias: f32, slope_bias: f32) {
        self.commands.push(ShadowCommand::SetDepthBias { bias, slope_bias });
    }

    fn set_shadow_pancaking(&mut self, enabled: bool) {
        self.commands.push(ShadowCommand::SetShadowPancaking { enabled });
    }

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings) {
        self.commands.push(ShadowCommand::DrawShadows { settings: *settings });
    }

    fn begin_sample(&mut self, name: &str) {
        self.commands.push(ShadowCommand::BeginSample { name: name.into() });
    }

    fn end_sample(&mut self, name: &str) {
        self.commands.push(ShadowCommand::EndSample { name: name.into() });
    }
}
