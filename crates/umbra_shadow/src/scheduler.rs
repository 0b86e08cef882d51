//! Shadow pass driver
//!
//! Runs one frame of shadow work as a typed sequence:
//!
//! ```text
//! Idle ──setup──► ShadowReservations ──render──► RenderedShadows ──cleanup──► Idle
//!                   reserve_directional            uniforms()
//!                   reserve_other
//! ```
//!
//! Each stage borrows the scheduler mutably, so reservations cannot be
//! made after rendering started and the uniforms cannot be read before
//! every reservation is known.

use log::{debug, trace, warn};
use umbra_math::{consts::SQRT_2, Vec2, Vec4};

use crate::backend::{
    AtlasTarget, CubeFace, LoadOp, ShadowBackend, ShadowCulling, ShadowDrawSettings,
    ShadowProjection, StoreOp,
};
use crate::cascade::{self, CascadeRecord, CascadeTable};
use crate::config::{ShadowSettings, MAX_CASCADES};
use crate::data::ShadowUniforms;
use crate::ledger::{OtherShadowRequest, ReservationLedger};
use crate::light::Light;
use crate::packer::AtlasLayout;
use crate::projector::to_atlas_matrix;
use crate::variants::VariantSelection;

/// Profiling scope name of the shadow pass
pub const SHADOW_SAMPLE_NAME: &str = "Shadows";

/// Size of the placeholder directional atlas bound when nothing casts
const DUMMY_ATLAS_SIZE: u32 = 1;

/// Point light cube faces are rendered without widening the field of view
const POINT_FOV_BIAS: f32 = 0.0;

/// Where the scheduler is in its frame cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FramePhase {
    #[default]
    Idle,
    Setup,
    Reserving,
    Rendering,
    CleanedUp,
}

/// Per-pipeline shadow scheduler owning the ledger and the uniform tables
#[derive(Clone, Debug, Default)]
pub struct ShadowScheduler {
    settings: ShadowSettings,
    ledger: ReservationLedger,
    cascades: CascadeTable,
    uniforms: ShadowUniforms,
    phase: FramePhase,
    frame: u64,
}

impl ShadowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Number of frames set up so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Settings of the current (or last) frame
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Begin a frame: reset the ledger and tables and open reservations
    pub fn setup<'a, C: ShadowCulling + ?Sized>(
        &'a mut self,
        culling: &'a C,
        settings: &ShadowSettings,
    ) -> ShadowReservations<'a, C> {
        if matches!(self.phase, FramePhase::Reserving | FramePhase::Rendering) {
            warn!(
                "Shadow frame {} set up while frame {} was not cleaned up",
                self.frame + 1,
                self.frame
            );
        }

        self.phase = FramePhase::Setup;
        self.frame += 1;
        self.settings = settings.clone();
        // Hand-built or deserialized settings may have skipped validate()
        let cascade_count = &mut self.settings.directional.cascade_count;
        if !(1..=MAX_CASCADES as u32).contains(cascade_count) {
            let clamped = (*cascade_count).clamp(1, MAX_CASCADES as u32);
            warn!(
                "Shadow cascade count {} out of range, using {}",
                cascade_count, clamped
            );
            *cascade_count = clamped;
        }
        self.ledger.reset();
        self.cascades.clear();
        self.uniforms.clear();
        self.phase = FramePhase::Reserving;

        trace!("Shadow frame {} setup", self.frame);

        ShadowReservations {
            scheduler: self,
            culling,
        }
    }
}

/// Reservation stage of a frame
pub struct ShadowReservations<'a, C: ShadowCulling + ?Sized> {
    scheduler: &'a mut ShadowScheduler,
    culling: &'a C,
}

impl<'a, C: ShadowCulling + ?Sized> ShadowReservations<'a, C> {
    pub fn phase(&self) -> FramePhase {
        self.scheduler.phase
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.scheduler.ledger
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.scheduler.settings
    }

    /// Reserve cascade tiles for a visible directional light
    pub fn reserve_directional(&mut self, light: &Light, visible_light_index: usize) -> Vec4 {
        let culling = self.culling;
        let cascade_count = self.scheduler.settings.directional.cascade_count();
        self.scheduler
            .ledger
            .reserve_directional(light, visible_light_index, cascade_count, || {
                culling.has_shadow_caster_bounds(visible_light_index)
            })
    }

    /// Reserve atlas tiles for a visible spot or point light
    pub fn reserve_other(&mut self, light: &Light, visible_light_index: usize) -> Vec4 {
        let culling = self.culling;
        self.scheduler.ledger.reserve_other(light, visible_light_index, || {
            culling.has_shadow_caster_bounds(visible_light_index)
        })
    }

    /// Render both atlases and produce the frame's uniforms
    pub fn render<B: ShadowBackend + ?Sized>(self, backend: &mut B) -> RenderedShadows<'a> {
        let ShadowReservations { scheduler, culling } = self;
        scheduler.phase = FramePhase::Rendering;

        let mut pass = ShadowPass {
            settings: &scheduler.settings,
            ledger: &scheduler.ledger,
            cascades: &mut scheduler.cascades,
            uniforms: &mut scheduler.uniforms,
            culling,
            backend,
        };
        pass.run();

        RenderedShadows { scheduler }
    }
}

/// Rendered stage of a frame, holding the finished uniforms
pub struct RenderedShadows<'a> {
    scheduler: &'a mut ShadowScheduler,
}

impl<'a> RenderedShadows<'a> {
    pub fn phase(&self) -> FramePhase {
        self.scheduler.phase
    }

    pub fn uniforms(&self) -> &ShadowUniforms {
        &self.scheduler.uniforms
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.scheduler.ledger
    }

    /// Cascade records written this frame
    pub fn cascades(&self) -> &CascadeTable {
        &self.scheduler.cascades
    }

    /// Release the transient atlases and end the frame
    pub fn cleanup<B: ShadowBackend + ?Sized>(self, backend: &mut B) {
        let scheduler = self.scheduler;

        backend.release_temporary_target(AtlasTarget::Directional);
        if scheduler.ledger.other_tile_count() > 0 {
            backend.release_temporary_target(AtlasTarget::Other);
        }

        scheduler.phase = FramePhase::CleanedUp;
        trace!("Shadow frame {} cleaned up", scheduler.frame);
        scheduler.phase = FramePhase::Idle;
    }
}

/// Borrowed state for one render pass over both atlases
struct ShadowPass<'s, C: ?Sized, B: ?Sized> {
    settings: &'s ShadowSettings,
    ledger: &'s ReservationLedger,
    cascades: &'s mut CascadeTable,
    uniforms: &'s mut ShadowUniforms,
    culling: &'s C,
    backend: &'s mut B,
}

impl<'s, C: ShadowCulling + ?Sized, B: ShadowBackend + ?Sized> ShadowPass<'s, C, B> {
    fn run(&mut self) {
        let settings = self.settings;
        let directional_count = self.ledger.directional_count();
        let other_tiles = self.ledger.other_tile_count();

        if directional_count > 0 {
            self.render_directional();
        } else {
            // Shaders always sample a bound atlas
            self.backend
                .get_temporary_depth_target(AtlasTarget::Directional, DUMMY_ATLAS_SIZE);
            self.uniforms.set_directional_atlas_size(DUMMY_ATLAS_SIZE);
        }

        if other_tiles > 0 {
            self.render_other();
        } else {
            self.backend
                .alias_texture(AtlasTarget::Other, AtlasTarget::Directional);
            let [size, inverse, ..] = self.uniforms.globals.atlas_size;
            self.uniforms.globals.atlas_size[2] = size;
            self.uniforms.globals.atlas_size[3] = inverse;
        }

        self.backend.begin_sample(SHADOW_SAMPLE_NAME);

        let mask_mode = self.ledger.use_shadow_mask().then_some(settings.shadow_mask_mode);
        self.uniforms.variants.shadow_mask = VariantSelection::shadow_mask(mask_mode);

        let directional = &settings.directional;
        self.uniforms.globals.cascade_count = if directional_count > 0 {
            directional.cascade_count as i32
        } else {
            0
        };
        self.uniforms.globals.distance_fade = cascade::distance_fade(
            settings.max_distance,
            settings.distance_fade,
            directional.cascade_fade,
        )
        .to_array();

        self.backend.end_sample(SHADOW_SAMPLE_NAME);

        debug!(
            "Shadow frame: {} directional lights, {} other tiles, shadow mask {}",
            directional_count,
            other_tiles,
            if self.ledger.use_shadow_mask() { "on" } else { "off" }
        );
    }

    /// Bind `target` at `size` texels and clear it for depth rendering
    fn begin_atlas(&mut self, target: AtlasTarget, size: u32, pancaking: bool) {
        self.backend.get_temporary_depth_target(target, size);
        self.backend
            .set_render_target(target, LoadOp::DontCare, StoreOp::Store);
        self.backend.clear_depth();
        self.backend.set_shadow_pancaking(pancaking);
        self.backend.begin_sample(SHADOW_SAMPLE_NAME);
    }

    /// Set the tile viewport and return the tile's grid offset
    fn tile_viewport(&mut self, layout: &AtlasLayout, tile: usize) -> Vec2 {
        let viewport = layout.viewport(tile);
        self.backend.set_viewport(viewport.rect);
        viewport.offset
    }

    /// Issue one biased shadow draw for a tile
    fn draw_tile(
        &mut self,
        projection: &ShadowProjection,
        visible_light_index: usize,
        slope_bias: f32,
    ) {
        self.backend
            .set_view_projection(&projection.view, &projection.projection);
        self.backend.set_depth_bias(0.0, slope_bias);
        self.backend.draw_shadows(&ShadowDrawSettings {
            visible_light_index,
            split: projection.split,
        });
        self.backend.set_depth_bias(0.0, 0.0);
    }

    fn render_directional(&mut self) {
        let ledger = self.ledger;
        let settings = self.settings;
        let directional = &settings.directional;
        let atlas_size = directional.atlas_size.texels();
        self.uniforms.set_directional_atlas_size(atlas_size);
        self.begin_atlas(AtlasTarget::Directional, atlas_size, true);

        let cascade_count = directional.cascade_count();
        let tiles = ledger.directional_count() * cascade_count;
        let layout = AtlasLayout::new(atlas_size, tiles);
        debug!(
            "Directional atlas {}: {} tiles, split {}, tile size {}",
            atlas_size, tiles, layout.split, layout.tile_size
        );

        let ratios = directional.cascade_ratios_vec();
        let culling_factor = cascade::culling_factor(directional.cascade_fade);
        let reversed_z = self.backend.uses_reversed_z();

        for (index, request) in ledger.directional_requests().iter().enumerate() {
            let tile_offset = index * cascade_count;

            for cascade_index in 0..cascade_count {
                let mut projection = self.culling.directional_shadow(
                    request.visible_light_index,
                    cascade_index,
                    cascade_count,
                    ratios,
                    layout.tile_size,
                    request.near_plane_offset,
                );
                projection.split.cascade_blend_culling_factor = culling_factor;

                // Cascade geometry is camera-relative, shared by every light
                if index == 0 {
                    self.cascades.set(
                        cascade_index,
                        CascadeRecord::new(
                            projection.split.culling_sphere,
                            layout.tile_size,
                            directional.filter,
                        ),
                    );
                }

                let tile = tile_offset + cascade_index;
                let offset = self.tile_viewport(&layout, tile);
                let matrix = to_atlas_matrix(
                    &projection.view_projection(),
                    offset,
                    layout.tile_scale(),
                    reversed_z,
                );
                self.uniforms.set_directional_matrix(tile, &matrix);

                trace!(
                    "Directional tile {} (light {}, cascade {})",
                    tile, request.visible_light_index, cascade_index
                );
                self.draw_tile(&projection, request.visible_light_index, request.slope_scale_bias);
            }
        }

        self.uniforms.cascade_culling_spheres = self.cascades.culling_spheres();
        self.uniforms.cascade_data = self.cascades.cascade_data();
        let variants = &mut self.uniforms.variants;
        variants.directional_filter =
            VariantSelection::directional_filter(Some(directional.filter));
        variants.cascade_blend = VariantSelection::cascade_blend(Some(directional.cascade_blend));

        self.backend.end_sample(SHADOW_SAMPLE_NAME);
    }

    fn render_other(&mut self) {
        let ledger = self.ledger;
        let settings = self.settings;
        let other = &settings.other;
        let atlas_size = other.atlas_size.texels();
        self.uniforms.set_other_atlas_size(atlas_size);
        self.begin_atlas(AtlasTarget::Other, atlas_size, false);

        let tiles = ledger.other_tile_count();
        let layout = AtlasLayout::new(atlas_size, tiles);
        debug!(
            "Other atlas {}: {} tiles, split {}, tile size {}",
            atlas_size, tiles, layout.split, layout.tile_size
        );

        for (tile, request) in ledger.other_requests() {
            if request.is_point {
                self.render_point(&layout, tile, request);
            } else {
                self.render_spot(&layout, tile, request);
            }
        }

        self.uniforms.variants.other_filter = VariantSelection::other_filter(Some(other.filter));

        self.backend.end_sample(SHADOW_SAMPLE_NAME);
    }

    /// Normal bias scaled to the filter footprint of a texel
    fn other_bias(&self, request: &OtherShadowRequest, texel_size: f32) -> f32 {
        let filter_index = self.settings.other.filter.filter_quality_index() as f32;
        let filter_size = texel_size * (filter_index + 1.0);
        request.normal_bias * filter_size * SQRT_2
    }

    fn render_spot(&mut self, layout: &AtlasLayout, tile: usize, request: &OtherShadowRequest) {
        let projection = self.culling.spot_shadow(request.visible_light_index);

        let texel_size = 2.0 / (layout.tile_size as f32 * projection.projection.get(0, 0));
        let bias = self.other_bias(request, texel_size);

        self.render_other_tile(layout, tile, request, &projection, bias);
    }

    fn render_point(
        &mut self,
        layout: &AtlasLayout,
        first_tile: usize,
        request: &OtherShadowRequest,
    ) {
        let texel_size = 2.0 / layout.tile_size as f32;
        let bias = self.other_bias(request, texel_size);

        for (face_index, face) in CubeFace::ALL.into_iter().enumerate() {
            let mut projection = self
                .culling
                .point_shadow(request.visible_light_index, face, POINT_FOV_BIAS);

            // Faces are rendered upside down, flip them to match atlas sampling
            for col in 1..4 {
                let value = projection.view.get(1, col);
                projection.view.set(1, col, -value);
            }

            self.render_other_tile(layout, first_tile + face_index, request, &projection, bias);
        }
    }

    fn render_other_tile(
        &mut self,
        layout: &AtlasLayout,
        tile: usize,
        request: &OtherShadowRequest,
        projection: &ShadowProjection,
        bias: f32,
    ) {
        let reversed_z = self.backend.uses_reversed_z();
        let offset = self.tile_viewport(layout, tile);
        let scale = layout.tile_scale();

        self.uniforms.set_other_tile(tile, offset, scale, bias);
        let matrix = to_atlas_matrix(&projection.view_projection(), offset, scale, reversed_z);
        self.uniforms.set_other_matrix(tile, &matrix);

        trace!("Other tile {} (light {}, bias {})", tile, request.visible_light_index, bias);
        self.draw_tile(projection, request.visible_light_index, request.slope_scale_bias);
    }
}
