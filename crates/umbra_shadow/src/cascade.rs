//! Cascaded Shadow Map Calculations
//!
//! Per-cascade data for directional lights. Split geometry comes from
//! the culling collaborator; this module derives what the shading
//! stage needs to pick a cascade and size its filter.
//!
//! # Culling spheres
//!
//! The shading stage selects a cascade by testing the fragment against
//! each cascade's culling sphere. Spheres are stored with their radius
//! shrunk by the filter footprint and squared, so the test is a plain
//! squared-distance compare and filtering near the edge never samples
//! outside the cascade.

use umbra_math::{consts::SQRT_2, Vec4};

use crate::config::{FilterMode, MAX_CASCADES};

/// Stored sphere and filter data for one cascade
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CascadeRecord {
    /// Center in xyz, squared shrunk radius in w
    pub culling_sphere: Vec4,
    /// x = 1 / radius, y = filter footprint * sqrt(2)
    pub data: Vec4,
}

impl CascadeRecord {
    /// Derive the record from the culling sphere (radius in `w`) of a
    /// cascade rendered into a `tile_size` texel tile
    pub fn new(culling_sphere: Vec4, tile_size: u32, filter: FilterMode) -> Self {
        let radius = culling_sphere.w;
        let texel_size = 2.0 * radius / tile_size as f32;
        let filter_size = texel_size * (filter.filter_quality_index() as f32 + 1.0);

        let shrunk = radius - filter_size;
        let mut sphere = culling_sphere;
        sphere.w = shrunk * shrunk;

        Self {
            culling_sphere: sphere,
            data: Vec4::new(1.0 / radius, filter_size * SQRT_2, 0.0, 0.0),
        }
    }
}

/// Blend culling factor handed to the culling collaborator
///
/// Larger cascade fades keep more casters alive in the overlap region.
pub fn culling_factor(cascade_fade: f32) -> f32 {
    (0.8 - cascade_fade).max(0.0)
}

/// Distance fade vector for the whole cascade set
///
/// x = 1 / max distance, y = 1 / distance fade, z = 1 / (1 - (1 - cascade fade)^2)
pub fn distance_fade(max_distance: f32, distance_fade: f32, cascade_fade: f32) -> Vec4 {
    let f = 1.0 - cascade_fade;
    Vec4::new(
        1.0 / max_distance,
        1.0 / distance_fade,
        1.0 / (1.0 - f * f),
        0.0,
    )
}

/// Cascade records shared by every directional light of a frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CascadeTable {
    records: [CascadeRecord; MAX_CASCADES],
    count: usize,
}

impl CascadeTable {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Store the record for cascade `index`
    pub fn set(&mut self, index: usize, record: CascadeRecord) {
        debug_assert!(index < MAX_CASCADES, "cascade index {} out of range", index);
        self.records[index] = record;
        self.count = self.count.max(index + 1);
    }

    pub fn get(&self, index: usize) -> Option<&CascadeRecord> {
        self.records[..self.count].get(index)
    }

    /// Number of cascades written this frame
    pub fn count(&self) -> usize {
        self.count
    }

    /// Culling spheres in the fixed-size uniform layout
    pub fn culling_spheres(&self) -> [[f32; 4]; MAX_CASCADES] {
        self.records.map(|r| r.culling_sphere.to_array())
    }

    /// Cascade data in the fixed-size uniform layout
    pub fn cascade_data(&self) -> [[f32; 4]; MAX_CASCADES] {
        self.records.map(|r| r.data.to_array())
    }
}
