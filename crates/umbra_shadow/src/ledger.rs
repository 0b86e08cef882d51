//! Shadow Reservation Ledger
//!
//! Per-frame record of which visible lights asked for atlas tiles.
//! Storage is fixed-size: 4 directional lights and 16 other-light
//! tiles. A point light needs one tile per cube face, so it is admitted
//! with all six tiles or not at all.
//!
//! Every reservation returns an encoded vector for the shading stage:
//!
//! | Light       | x                | y                       | z           | w            |
//! |-------------|------------------|-------------------------|-------------|--------------|
//! | Directional | strength         | first cascade tile      | normal bias | mask channel |
//! | Other       | strength         | first tile              | 1 if point  | mask channel |
//! | Degraded    | -strength        | 0                       | 0           | mask channel |
//! | Disabled    | 0                | 0                       | 0           | -1           |

use log::{trace, warn};
use umbra_math::Vec4;

use crate::light::{Light, LightKind};

/// Maximum shadowed directional lights per frame
pub const MAX_SHADOWED_DIRECTIONAL_LIGHTS: usize = 4;

/// Other-light atlas tiles per frame
pub const MAX_SHADOWED_OTHER_TILES: usize = 16;

/// Tiles consumed by one point light (one per cube face)
pub const POINT_LIGHT_TILES: usize = 6;

/// Returned for lights that do not cast dynamic shadows
pub const DISABLED_SHADOW_DATA: Vec4 = Vec4::new(0.0, 0.0, 0.0, -1.0);

/// A directional light admitted this frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DirectionalShadowRequest {
    pub visible_light_index: usize,
    pub slope_scale_bias: f32,
    pub near_plane_offset: f32,
}

/// A spot or point light admitted this frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OtherShadowRequest {
    pub visible_light_index: usize,
    pub slope_scale_bias: f32,
    pub normal_bias: f32,
    pub is_point: bool,
}

impl OtherShadowRequest {
    /// Atlas tiles this request occupies
    pub fn tile_count(&self) -> usize {
        if self.is_point {
            POINT_LIGHT_TILES
        } else {
            1
        }
    }
}

/// Bounded per-frame reservation storage
#[derive(Clone, Debug, Default)]
pub struct ReservationLedger {
    directional: [DirectionalShadowRequest; MAX_SHADOWED_DIRECTIONAL_LIGHTS],
    directional_count: usize,
    /// Indexed by first tile; a point light leaves the next five entries unused
    other: [OtherShadowRequest; MAX_SHADOWED_OTHER_TILES],
    other_tile_count: usize,
    use_shadow_mask: bool,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every reservation and the shadow-mask flag
    pub fn reset(&mut self) {
        self.directional_count = 0;
        self.other_tile_count = 0;
        self.use_shadow_mask = false;
    }

    /// Number of directional lights admitted
    pub fn directional_count(&self) -> usize {
        self.directional_count
    }

    /// Number of other-light tiles consumed
    pub fn other_tile_count(&self) -> usize {
        self.other_tile_count
    }

    /// Whether any reserved light is a mixed shadow-mask light
    pub fn use_shadow_mask(&self) -> bool {
        self.use_shadow_mask
    }

    pub fn directional_requests(&self) -> &[DirectionalShadowRequest] {
        &self.directional[..self.directional_count]
    }

    /// Admitted other lights with their first tile index, in reservation order
    pub fn other_requests(&self) -> OtherRequests<'_> {
        OtherRequests {
            ledger: self,
            tile: 0,
        }
    }

    /// Record shadow-mask usage and return the channel to report
    fn mask_channel(&mut self, light: &Light) -> f32 {
        if light.baking.uses_shadow_mask() {
            self.use_shadow_mask = true;
            light.baking.occlusion_mask_channel as f32
        } else {
            -1.0
        }
    }

    /// Reserve cascade tiles for a directional light.
    ///
    /// `has_bounds` is only queried once the light is known to fit, so
    /// the culling collaborator is not asked about lights that are
    /// rejected anyway.
    pub fn reserve_directional(
        &mut self,
        light: &Light,
        visible_light_index: usize,
        cascade_count: usize,
        has_bounds: impl FnOnce() -> bool,
    ) -> Vec4 {
        if !light.casts_shadows() {
            return DISABLED_SHADOW_DATA;
        }

        let mask_channel = self.mask_channel(light);
        let degraded = Vec4::new(-light.shadow_strength, 0.0, 0.0, mask_channel);

        if self.directional_count >= MAX_SHADOWED_DIRECTIONAL_LIGHTS {
            warn!(
                "Directional shadow capacity ({}) reached, light {} renders unshadowed",
                MAX_SHADOWED_DIRECTIONAL_LIGHTS, visible_light_index
            );
            return degraded;
        }
        if !has_bounds() {
            trace!("Directional light {} has no shadow casters in view", visible_light_index);
            return degraded;
        }

        let index = self.directional_count;
        self.directional[index] = DirectionalShadowRequest {
            visible_light_index,
            slope_scale_bias: light.shadow_bias,
            near_plane_offset: light.shadow_near_plane,
        };
        self.directional_count += 1;

        trace!(
            "Reserved directional shadow {} for light {} ({} cascades)",
            index, visible_light_index, cascade_count
        );

        Vec4::new(
            light.shadow_strength,
            (cascade_count * index) as f32,
            light.shadow_normal_bias,
            mask_channel,
        )
    }

    /// Reserve one tile for a spot light or six for a point light
    pub fn reserve_other(
        &mut self,
        light: &Light,
        visible_light_index: usize,
        has_bounds: impl FnOnce() -> bool,
    ) -> Vec4 {
        if !light.casts_shadows() {
            return DISABLED_SHADOW_DATA;
        }

        let mask_channel = self.mask_channel(light);
        let degraded = Vec4::new(-light.shadow_strength, 0.0, 0.0, mask_channel);

        let is_point = light.kind == LightKind::Point;
        let request = OtherShadowRequest {
            visible_light_index,
            slope_scale_bias: light.shadow_bias,
            normal_bias: light.shadow_normal_bias,
            is_point,
        };
        let first_tile = self.other_tile_count;
        let end_tile = first_tile + request.tile_count();

        if end_tile > MAX_SHADOWED_OTHER_TILES {
            warn!(
                "Not enough atlas tiles for light {} (needs {}, {} of {} free)",
                visible_light_index,
                request.tile_count(),
                MAX_SHADOWED_OTHER_TILES - first_tile,
                MAX_SHADOWED_OTHER_TILES
            );
            return degraded;
        }
        if !has_bounds() {
            trace!("Light {} has no shadow casters in view", visible_light_index);
            return degraded;
        }

        self.other[first_tile] = request;
        self.other_tile_count = end_tile;

        trace!(
            "Reserved tiles {}..{} for {} light {}",
            first_tile,
            end_tile,
            if is_point { "point" } else { "spot" },
            visible_light_index
        );

        Vec4::new(
            light.shadow_strength,
            first_tile as f32,
            if is_point { 1.0 } else { 0.0 },
            mask_channel,
        )
    }
}

/// Iterator over admitted other lights, yielding `(first_tile, request)`
pub struct OtherRequests<'a> {
    ledger: &'a ReservationLedger,
    tile: usize,
}

impl<'a> Iterator for OtherRequests<'a> {
    type Item = (usize, &'a OtherShadowRequest);

    fn next(&mut self) -> Option<Self::Item> {
        if self.tile >= self.ledger.other_tile_count {
            return None;
        }
        let tile = self.tile;
        let request = &self.ledger.other[tile];
        self.tile += request.tile_count();
        Some((tile, request))
    }
}
