//! Frame scenarios for umbra_shadow
//!
//! Drives whole setup, reserve, render, cleanup cycles against a small
//! scene and checks what reaches the backend and the uniforms.

use umbra_math::{radians, Mat4, Vec3, Vec4};
use umbra_shadow::backend::ShadowCommand;
use umbra_shadow::ledger::{MAX_SHADOWED_DIRECTIONAL_LIGHTS, MAX_SHADOWED_OTHER_TILES};
use umbra_shadow::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scene with real light-space projections
struct TestScene {
    lights: Vec<VisibleLight>,
    without_casters: Vec<usize>,
}

impl TestScene {
    fn new(lights: Vec<VisibleLight>) -> Self {
        Self {
            lights,
            without_casters: Vec::new(),
        }
    }
}

impl ShadowCulling for TestScene {
    fn has_shadow_caster_bounds(&self, visible_light_index: usize) -> bool {
        !self.without_casters.contains(&visible_light_index)
    }

    fn directional_shadow(
        &self,
        visible_light_index: usize,
        cascade_index: usize,
        _cascade_count: usize,
        _cascade_ratios: Vec3,
        _tile_size: u32,
        near_plane_offset: f32,
    ) -> ShadowProjection {
        let radius = 5.0 * (cascade_index + 1) as f32;
        let center = Vec3::new(0.0, 0.0, -radius);
        let direction = self.lights[visible_light_index].direction();

        ShadowProjection {
            view: Mat4::look_at(center - direction * (2.0 * radius), center, Vec3::Y),
            projection: Mat4::orthographic(
                -radius,
                radius,
                -radius,
                radius,
                near_plane_offset,
                4.0 * radius,
            ),
            split: ShadowSplitData {
                culling_sphere: center.extend(radius),
                cascade_blend_culling_factor: 0.0,
            },
        }
    }

    fn spot_shadow(&self, visible_light_index: usize) -> ShadowProjection {
        let light = &self.lights[visible_light_index];
        let position = light.position();

        ShadowProjection {
            view: Mat4::look_at(position, position + light.direction(), Vec3::Y),
            projection: Mat4::perspective(radians(light.spot_angle), 1.0, 0.1, light.range),
            split: ShadowSplitData::default(),
        }
    }

    fn point_shadow(
        &self,
        visible_light_index: usize,
        face: CubeFace,
        fov_bias: f32,
    ) -> ShadowProjection {
        let light = &self.lights[visible_light_index];
        let position = light.position();
        let up = match face {
            CubeFace::PositiveY | CubeFace::NegativeY => Vec3::Z,
            _ => Vec3::Y,
        };

        ShadowProjection {
            view: Mat4::look_at(position, position + face.forward(), up),
            projection: Mat4::perspective(radians(90.0 + fov_bias), 1.0, 0.1, light.range),
            split: ShadowSplitData::default(),
        }
    }
}

fn visible(light: Light, position: Vec3) -> VisibleLight {
    let mut visible = VisibleLight::new(light, Vec3::ONE, Mat4::from_translation(position));
    visible.range = 20.0;
    visible.spot_angle = 60.0;
    visible
}

fn is_zero(matrix: &[[f32; 4]; 4]) -> bool {
    matrix.iter().flatten().all(|v| *v == 0.0)
}

#[test]
fn scenario_single_directional_light() {
    init_logging();

    let scene = TestScene::new(vec![visible(Light::directional().with_shadows(1.0), Vec3::ZERO)]);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    let data = reservations.reserve_directional(&scene.lights[0].light, 0);
    assert_eq!(data, Vec4::new(1.0, 0.0, 0.0, -1.0));

    let rendered = reservations.render(&mut backend);
    let uniforms = rendered.uniforms();

    assert_eq!(backend.allocated_size(AtlasTarget::Directional), Some(1024));
    assert_eq!(backend.allocated_size(AtlasTarget::Other), None);
    assert_eq!(backend.draw_count(), 4);

    let viewports = backend.viewports();
    assert_eq!(viewports.len(), 4);
    assert!(viewports.iter().all(|r| r.width == 512 && r.height == 512));
    assert_eq!(viewports[3], TileRect { x: 512, y: 512, width: 512, height: 512 });

    for tile in 0..4 {
        assert!(!is_zero(&uniforms.directional_matrices[tile]), "tile {} not written", tile);
    }
    for tile in 4..uniforms.directional_matrices.len() {
        assert!(is_zero(&uniforms.directional_matrices[tile]), "tile {} written", tile);
    }

    assert_eq!(uniforms.globals.cascade_count, 4);
    assert_eq!(uniforms.globals.atlas_size[0], 1024.0);
    assert_eq!(uniforms.variants.directional_filter.enabled_keyword(), Some("_DIRECTIONAL_PCF2"));
    assert_eq!(uniforms.variants.cascade_blend.enabled_keyword(), Some("_CASCADE_BLEND_HARD"));
    assert_eq!(uniforms.variants.other_filter.active(), None);

    // Every cascade got the blend culling factor
    let factors: Vec<f32> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            ShadowCommand::DrawShadows { settings } => {
                Some(settings.split.cascade_blend_culling_factor)
            }
            _ => None,
        })
        .collect();
    assert!(factors.iter().all(|f| (f - 0.7).abs() < 1e-6));

    rendered.cleanup(&mut backend);
    assert!(backend.released(AtlasTarget::Directional));
    assert!(!backend.released(AtlasTarget::Other));
}

#[test]
fn scenario_no_shadow_casters() {
    init_logging();

    let scene = TestScene::new(vec![visible(Light::directional(), Vec3::ZERO)]);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    assert_eq!(reservations.reserve_directional(&scene.lights[0].light, 0), DISABLED_SHADOW_DATA);

    let rendered = reservations.render(&mut backend);
    assert_eq!(backend.allocated_size(AtlasTarget::Directional), Some(1));
    assert_eq!(backend.allocated_size(AtlasTarget::Other), None);
    assert!(backend.commands().contains(&ShadowCommand::AliasTexture {
        target: AtlasTarget::Other,
        source: AtlasTarget::Directional,
    }));
    assert_eq!(backend.draw_count(), 0);

    let globals = rendered.uniforms().globals;
    assert_eq!(globals.cascade_count, 0);
    assert_eq!(globals.atlas_size, [1.0, 1.0, 1.0, 1.0]);
    assert!(rendered.uniforms().variants.enabled_keywords().is_empty());

    rendered.cleanup(&mut backend);
    assert!(backend.released(AtlasTarget::Directional));
    assert!(!backend.released(AtlasTarget::Other));
    assert_eq!(scheduler.phase(), FramePhase::Idle);
}

#[test]
fn scenario_three_point_lights() {
    init_logging();

    let lights: Vec<_> = (0..3)
        .map(|i| visible(Light::point().with_shadows(0.6), Vec3::new(i as f32 * 4.0, 2.0, 0.0)))
        .collect();
    let scene = TestScene::new(lights);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    let results: Vec<Vec4> = scene
        .lights
        .iter()
        .enumerate()
        .map(|(i, l)| reservations.reserve_other(&l.light, i))
        .collect();

    assert_eq!(results[0], Vec4::new(0.6, 0.0, 1.0, -1.0));
    assert_eq!(results[1], Vec4::new(0.6, 6.0, 1.0, -1.0));
    assert_eq!(results[2], Vec4::new(-0.6, 0.0, 0.0, -1.0));
    assert_eq!(reservations.ledger().other_tile_count(), 12);

    let rendered = reservations.render(&mut backend);
    assert_eq!(backend.allocated_size(AtlasTarget::Other), Some(1024));
    assert_eq!(backend.draw_count(), 12);
    assert!(backend.viewports().iter().all(|r| r.width == 256));
    assert!(backend
        .commands()
        .contains(&ShadowCommand::SetShadowPancaking { enabled: false }));

    let uniforms = rendered.uniforms();
    for tile in 0..12 {
        assert!(!is_zero(&uniforms.other_matrices[tile]));
        // Zero normal bias
        assert_eq!(uniforms.other_tiles[tile][3], 0.0);
    }
    assert!(is_zero(&uniforms.other_matrices[12]));
    assert_eq!(uniforms.variants.other_filter.enabled_keyword(), Some("_OTHER_PCF2"));

    rendered.cleanup(&mut backend);
    assert!(backend.released(AtlasTarget::Other));
}

#[test]
fn scenario_light_without_caster_bounds() {
    init_logging();

    let mut scene = TestScene::new(vec![visible(Light::spot().with_shadows(0.8), Vec3::ZERO)]);
    scene.without_casters.push(0);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    let data = reservations.reserve_other(&scene.lights[0].light, 0);

    assert_eq!(data, Vec4::new(-0.8, 0.0, 0.0, -1.0));
    assert_eq!(reservations.ledger().other_tile_count(), 0);
}

#[test]
fn ledger_never_exceeds_capacity() {
    init_logging();

    let kinds = [Light::directional(), Light::spot(), Light::point()];
    let lights: Vec<_> = (0..40)
        .map(|i| visible(kinds[(i * 7 + i / 3) % 3].with_shadows(1.0), Vec3::ZERO))
        .collect();
    let scene = TestScene::new(lights);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    for (i, light) in scene.lights.iter().enumerate() {
        let before = reservations.ledger().other_tile_count();
        let data = match light.light.kind {
            LightKind::Directional => reservations.reserve_directional(&light.light, i),
            _ => reservations.reserve_other(&light.light, i),
        };

        let ledger = reservations.ledger();
        assert!(ledger.directional_count() <= MAX_SHADOWED_DIRECTIONAL_LIGHTS);
        assert!(ledger.other_tile_count() <= MAX_SHADOWED_OTHER_TILES);

        // Rejected point lights leave the ledger untouched
        if light.light.kind == LightKind::Point && data.x < 0.0 {
            assert_eq!(ledger.other_tile_count(), before);
        }
    }
}

#[test]
fn spot_tile_bias_follows_projection() {
    init_logging();

    let mut light = Light::spot().with_shadows(1.0);
    light.shadow_normal_bias = 2.0;
    let scene = TestScene::new(vec![visible(light, Vec3::new(0.0, 5.0, 0.0))]);

    let mut settings = ShadowSettings::default();
    settings.other.filter = FilterMode::Pcf3x3;
    settings.other.atlas_size = AtlasSize::Size512;

    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    assert_eq!(reservations.reserve_other(&light, 0), Vec4::new(1.0, 0.0, 0.0, -1.0));
    let rendered = reservations.render(&mut backend);

    // Single tile covers the whole atlas
    let m00 = 1.0 / radians(30.0).tan();
    let texel_size = 2.0 / (512.0 * m00);
    let expected_bias = 2.0 * texel_size * 2.0 * core::f32::consts::SQRT_2;

    let tile = rendered.uniforms().other_tiles[0];
    let border = 0.5 / 512.0;
    assert!((tile[0] - border).abs() < 1e-7);
    assert!((tile[2] - (1.0 - 2.0 * border)).abs() < 1e-6);
    assert!((tile[3] - expected_bias).abs() < 1e-6);
    assert_eq!(rendered.uniforms().variants.other_filter.enabled_keyword(), Some("_OTHER_PCF3"));
}

#[test]
fn point_tile_bias_follows_tile_size() {
    init_logging();

    let mut light = Light::point().with_shadows(1.0);
    light.shadow_normal_bias = 1.5;
    let scene = TestScene::new(vec![visible(light, Vec3::new(0.0, 3.0, 0.0))]);

    let mut settings = ShadowSettings::default();
    settings.other.filter = FilterMode::Pcf5x5;

    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    assert_eq!(reservations.reserve_other(&light, 0), Vec4::new(1.0, 0.0, 1.0, -1.0));
    let rendered = reservations.render(&mut backend);

    // Six tiles need the 4x4 grid: 256 texel tiles, filter index 2
    let texel_size = 2.0 / 256.0;
    let expected_bias = 1.5 * texel_size * 3.0 * core::f32::consts::SQRT_2;

    let uniforms = rendered.uniforms();
    for tile in 0..6 {
        assert!((uniforms.other_tiles[tile][3] - expected_bias).abs() < 1e-6);
    }
    assert_eq!(uniforms.other_tiles[6], [0.0; 4]);
    assert_eq!(uniforms.variants.other_filter.enabled_keyword(), Some("_OTHER_PCF5"));
}

#[test]
fn unvalidated_cascade_count_is_clamped() {
    init_logging();

    let lights: Vec<_> = (0..4)
        .map(|_| visible(Light::directional().with_shadows(1.0), Vec3::ZERO))
        .collect();
    let scene = TestScene::new(lights);
    let settings: ShadowSettings =
        serde_json::from_str(r#"{ "directional": { "cascade_count": 5 } }"#).unwrap();
    assert!(settings.validate().is_err());

    let mut scheduler = ShadowScheduler::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    assert_eq!(reservations.settings().directional.cascade_count, 4);
    for (i, light) in scene.lights.iter().enumerate() {
        let data = reservations.reserve_directional(&light.light, i);
        assert_eq!(data.y, (i * 4) as f32);
    }

    let rendered = reservations.render(&mut backend);
    assert_eq!(backend.draw_count(), 16);
    assert_eq!(rendered.cascades().count(), 4);
    assert_eq!(rendered.uniforms().globals.cascade_count, 4);
    rendered.cleanup(&mut backend);

    let mut settings = settings;
    settings.directional.cascade_count = 0;
    let mut reservations = scheduler.setup(&scene, &settings);
    reservations.reserve_directional(&scene.lights[0].light, 0);
    let rendered = reservations.render(&mut backend);
    assert_eq!(rendered.cascades().count(), 1);
    assert_eq!(rendered.uniforms().globals.cascade_count, 1);
}

#[test]
fn reversed_z_flips_stored_depth() {
    init_logging();

    let scene = TestScene::new(vec![visible(Light::directional().with_shadows(1.0), Vec3::ZERO)]);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();

    let mut forward = CommandRecorder::new();
    let mut reservations = scheduler.setup(&scene, &settings);
    reservations.reserve_directional(&scene.lights[0].light, 0);
    let rendered = reservations.render(&mut forward);
    let standard = rendered.uniforms().directional_matrix(0);
    rendered.cleanup(&mut forward);

    let mut reversed = CommandRecorder::with_reversed_z(true);
    let mut reservations = scheduler.setup(&scene, &settings);
    reservations.reserve_directional(&scene.lights[0].light, 0);
    let rendered = reservations.render(&mut reversed);
    let flipped = rendered.uniforms().directional_matrix(0);

    // Same xy placement, depth mirrored around 0.5
    let p = Vec4::new(0.0, 0.0, -5.0, 1.0);
    let (a, b) = (standard * p, flipped * p);
    assert!((a.x - b.x).abs() < 1e-5);
    assert!((a.y - b.y).abs() < 1e-5);
    assert!((a.z + b.z - 1.0).abs() < 1e-5);
}

#[test]
fn lighting_pass_reserves_in_visible_order() {
    init_logging();

    let mut spot = visible(
        Light::spot()
            .with_shadows(1.0)
            .with_baking(LightBakingOutput::mixed_shadowmask(3)),
        Vec3::new(1.0, 2.0, 3.0),
    );
    spot.spot_angle = 45.0;

    let scene = TestScene::new(vec![
        visible(Light::directional().with_shadows(0.5), Vec3::ZERO),
        visible(Light::point().with_shadows(1.0), Vec3::new(0.0, 1.0, 0.0)),
        spot,
        visible(Light::point(), Vec3::ZERO),
    ]);
    let settings = ShadowSettings::from_json(r#"{ "shadow_mask_mode": "Distance" }"#).unwrap();
    let mut scheduler = ShadowScheduler::new();
    let mut lighting = Lighting::new();
    let mut backend = CommandRecorder::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    lighting.setup(&mut reservations, &scene.lights);

    let uniforms = lighting.uniforms();
    assert_eq!(uniforms.counts.directional_count, 1);
    assert_eq!(uniforms.counts.other_count, 3);
    assert_eq!(uniforms.directional[0].shadow_data, [0.5, 0.0, 0.0, -1.0]);
    assert_eq!(uniforms.directional[0].direction, [0.0, 0.0, -1.0, 0.0]);
    assert_eq!(uniforms.other[0].shadow_data, [1.0, 0.0, 1.0, -1.0]);
    assert_eq!(uniforms.other[1].shadow_data, [1.0, 6.0, 0.0, 3.0]);
    assert_eq!(uniforms.other[2].shadow_data, [0.0, 0.0, 0.0, -1.0]);
    assert_eq!(uniforms.other[1].position[..3], [1.0, 2.0, 3.0]);

    let rendered = reservations.render(&mut backend);
    assert_eq!(backend.draw_count(), 4 + 6 + 1);
    assert_eq!(
        rendered.uniforms().variants.shadow_mask.enabled_keyword(),
        Some("_SHADOW_MASK_DISTANCE")
    );
    rendered.cleanup(&mut backend);
}

#[test]
fn lighting_pass_drops_lights_past_limit() {
    init_logging();

    let lights: Vec<_> = (0..6)
        .map(|_| visible(Light::directional().with_shadows(1.0), Vec3::ZERO))
        .collect();
    let scene = TestScene::new(lights);
    let settings = ShadowSettings::default();
    let mut scheduler = ShadowScheduler::new();
    let mut lighting = Lighting::new();

    let mut reservations = scheduler.setup(&scene, &settings);
    lighting.setup(&mut reservations, &scene.lights);

    assert_eq!(lighting.buffer().stats().directional_count, 4);
    assert_eq!(lighting.buffer().stats().overflow_count, 2);
    assert_eq!(reservations.ledger().directional_count(), 4);
    assert_eq!(lighting.uniforms().directional[3].shadow_data[1], 12.0);
}
