use glam::Vec3;
use image::{Rgba, RgbaImage};

use lumentile::ecs::components::{TextureRef, TileTransform, TileVisual};
use lumentile::ecs::{Entity, EntityDesc};
use lumentile::lighting::light::DirtyPolicy;
use lumentile::lighting::shading::{attenuation, contribution, spot_admits, spot_cutoff};
use lumentile::resources::material::LightArray;
use lumentile::resources::texture_cache::MemoryImageSource;
use lumentile::{Engine, EngineConfig, HeadlessRenderer, LightComponent, LightKind};

const DT: f32 = 1.0 / 60.0;

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.time_of_day.paused = true;
    config.effects.spotlight_rotation = false;
    config
}

fn engine_with(config: EngineConfig) -> Engine<HeadlessRenderer> {
    let source = MemoryImageSource::new().with("grass.png", RgbaImage::from_pixel(16, 16, Rgba([40, 160, 40, 255])));
    Engine::new(config, Box::new(source), HeadlessRenderer::new())
}

fn lamp(x: f32) -> EntityDesc {
    EntityDesc::light(LightComponent::point(Vec3::new(x, 0.0, 30.0), Vec3::ONE, 0.01, 0.001))
}

fn tile(x: i32) -> EntityDesc {
    EntityDesc::tile(TileTransform::new(x, 0), TileVisual::new(TextureRef::new("grass.png")))
}

fn slot(engine: &Engine<HeadlessRenderer>, e: Entity) -> Option<u32> {
    engine.world().get::<LightComponent>(e).and_then(|l| l.slot())
}

/// Light array of the material bound to the chunk holding tile `x`.
fn chunk_array(engine: &Engine<HeadlessRenderer>, x: i32, kind: LightKind) -> Option<LightArray> {
    let chunk = engine.tiles()?.chunk_at(x, 0)?;
    let material = engine.resources().materials.get(chunk.renderable()?.material)?;
    material.uniforms.light_array(kind).cloned()
}

fn run(engine: &mut Engine<HeadlessRenderer>, frames: usize) {
    for _ in 0..frames {
        engine.advance(DT).unwrap();
    }
}

// ── Slots ───────────────────────────────────────────────────────────────────

#[test]
fn slots_are_stable_and_never_recycled() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(lamp(0.0));
    let (b, _) = engine.add_entity(lamp(10.0));
    let (c, _) = engine.add_entity(lamp(20.0));
    assert_eq!([slot(&engine, a), slot(&engine, b), slot(&engine, c)], [Some(0), Some(1), Some(2)]);

    engine.remove_entity(a);
    engine.remove_entity(b);
    run(&mut engine, 2);
    let (d, _) = engine.add_entity(lamp(30.0));

    assert_eq!(slot(&engine, c), Some(2));
    assert_eq!(slot(&engine, d), Some(3));
    assert_eq!(engine.lights(LightKind::Point).unwrap().sources(), &[c, d]);
}

#[test]
fn removed_lamp_goes_dark_in_every_chunk() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(lamp(0.0));
    let (b, _) = engine.add_entity(lamp(10.0));
    engine.add_entity(tile(0));
    engine.add_entity(tile(40));
    run(&mut engine, 3);
    assert!(chunk_array(&engine, 40, LightKind::Point).unwrap().get(0).is_some());

    engine.remove_entity(a);
    run(&mut engine, 1);
    // A chunk rebuilt after the removal must agree with the untouched one.
    engine.add_entity(tile(1));
    run(&mut engine, 3);

    for x in [0, 40] {
        let point = chunk_array(&engine, x, LightKind::Point).unwrap();
        assert!(point.get(0).is_none(), "chunk at {x} still lit by the removed lamp");
        assert!(point.get(1).is_some());
    }
    assert_eq!(slot(&engine, b), Some(1));
}

#[test]
fn removed_lamp_is_packed_dark_for_the_gpu() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(lamp(0.0));
    engine.add_entity(lamp(10.0));
    engine.add_entity(tile(0));
    run(&mut engine, 3);
    engine.render().unwrap();

    let mesh = engine.tiles().unwrap().chunk_at(0, 0).unwrap().renderable().unwrap().mesh;
    let packed = *engine.renderer().uniforms(mesh).unwrap();
    assert_eq!(packed.counts[1], 2);
    assert_eq!(packed.point[0].position, [0.0, 0.0, 30.0, 1.0]);
    assert_eq!(packed.point[0].attenuation[2], 1.0);

    engine.remove_entity(a);
    run(&mut engine, 1);
    engine.render().unwrap();
    let packed = engine.renderer().uniforms(mesh).unwrap();
    assert_eq!(packed.point[0].attenuation[2], 0.0);
    assert_eq!(packed.point[1].position, [10.0, 0.0, 30.0, 1.0]);
}

#[test]
fn out_of_range_explicit_slot_does_not_recycle() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(lamp(0.0));
    let (b, _) = engine.add_entity(EntityDesc::light(
        LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.0, 0.0).with_slot(u32::MAX),
    ));
    let (c, _) = engine.add_entity(lamp(20.0));
    assert_eq!([slot(&engine, a), slot(&engine, b), slot(&engine, c)], [Some(0), Some(1), Some(2)]);
}

#[test]
fn slot_counters_are_per_kind() {
    let mut engine = engine_with(config());
    let (p, _) = engine.add_entity(lamp(0.0));
    let (s, _) = engine.add_entity(EntityDesc::light(LightComponent::spot(
        Vec3::new(0.0, 0.0, 50.0),
        -Vec3::Z,
        0.5,
        Vec3::ONE,
        0.0,
        0.0,
    )));
    assert_eq!(slot(&engine, p), Some(0));
    assert_eq!(slot(&engine, s), Some(0));
    // The sun holds directional slot 0.
    let sun = engine.time_of_day().unwrap().sun().unwrap();
    assert_eq!(slot(&engine, sun), Some(0));
}

#[test]
fn explicit_slot_is_honoured() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(EntityDesc::light(
        LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.0, 0.0).with_slot(7),
    ));
    let (b, _) = engine.add_entity(lamp(0.0));
    assert_eq!(slot(&engine, a), Some(7));
    assert_eq!(slot(&engine, b), Some(8));
}

// ── Propagation ─────────────────────────────────────────────────────────────

#[test]
fn fresh_consumer_receives_every_existing_light() {
    let mut engine = engine_with(config());
    engine.add_entity(lamp(0.0));
    engine.add_entity(lamp(40.0));
    run(&mut engine, 3);

    // The sun has been propagated and cleaned by now.
    let sun = engine.time_of_day().unwrap().sun().unwrap();
    assert!(!engine.world().get::<LightComponent>(sun).unwrap().is_dirty());

    engine.add_entity(tile(0));
    run(&mut engine, 3);

    let directional = chunk_array(&engine, 0, LightKind::Directional).expect("sun reached the new chunk");
    assert!(directional.get(0).is_some());
    let point = chunk_array(&engine, 0, LightKind::Point).unwrap();
    assert_eq!(point.len(), 2);
    assert_eq!(point.get(1).unwrap().position, Vec3::new(40.0, 0.0, 30.0));
}

#[test]
fn changes_reach_existing_consumers() {
    let mut engine = engine_with(config());
    let (a, _) = engine.add_entity(lamp(0.0));
    engine.add_entity(tile(0));
    run(&mut engine, 3);

    engine.world_mut().get_mut::<LightComponent>(a).unwrap().set_color(Vec3::new(1.0, 0.0, 0.0));
    run(&mut engine, 1);
    let point = chunk_array(&engine, 0, LightKind::Point).unwrap();
    assert_eq!(point.get(0).unwrap().color, Vec3::new(1.0, 0.0, 0.0));

    engine.world_mut().get_mut::<LightComponent>(a).unwrap().set_off(true);
    run(&mut engine, 1);
    assert!(chunk_array(&engine, 0, LightKind::Point).unwrap().get(0).unwrap().off);
}

#[test]
fn updating_one_light_leaves_other_slots_alone() {
    let mut engine = engine_with(config());
    engine.add_entity(lamp(0.0));
    let (b, _) = engine.add_entity(lamp(10.0));
    let (c, _) = engine.add_entity(lamp(20.0));
    engine.add_entity(tile(0));
    run(&mut engine, 3);
    let before = chunk_array(&engine, 0, LightKind::Point).unwrap();

    engine.world_mut().get_mut::<LightComponent>(b).unwrap().set_color(Vec3::new(0.0, 0.0, 1.0));
    run(&mut engine, 1);
    let after = chunk_array(&engine, 0, LightKind::Point).unwrap();

    assert_eq!(slot(&engine, c), Some(2));
    assert_eq!(after.get(2), before.get(2));
    assert_eq!(after.get(0), before.get(0));
    assert_eq!(after.get(1).unwrap().color, Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn directional_registry_idles_without_changes() {
    let mut engine = engine_with(config());
    engine.add_entity(tile(0));
    run(&mut engine, 4);
    let passes = engine.lights(LightKind::Directional).unwrap().propagation_passes();
    run(&mut engine, 10);
    assert_eq!(engine.lights(LightKind::Directional).unwrap().propagation_passes(), passes);
}

#[test]
fn dirty_policy_is_configurable() {
    let mut cfg = config();
    cfg.lighting.point.dirty_policy = DirtyPolicy::Clear;
    let mut engine = engine_with(cfg);
    let (a, _) = engine.add_entity(lamp(0.0));
    run(&mut engine, 1);
    assert!(!engine.world().get::<LightComponent>(a).unwrap().is_dirty());
    assert_eq!(engine.lights(LightKind::Point).unwrap().policy(), DirtyPolicy::Clear);

    let mut engine = engine_with(config());
    let (b, _) = engine.add_entity(lamp(0.0));
    run(&mut engine, 3);
    assert!(engine.world().get::<LightComponent>(b).unwrap().is_dirty());
}

#[test]
fn running_clock_moves_the_sun_in_every_chunk() {
    let mut cfg = config();
    cfg.time_of_day.paused = false;
    cfg.time_of_day.start_minute = 600.0;
    let mut engine = engine_with(cfg);
    engine.add_entity(tile(0));
    run(&mut engine, 3);
    let before = chunk_array(&engine, 0, LightKind::Directional).unwrap().get(0).copied().unwrap();

    // 0.005 s per minute: one second is 200 minutes.
    run(&mut engine, 60);
    let after = chunk_array(&engine, 0, LightKind::Directional).unwrap().get(0).copied().unwrap();
    assert_ne!(before.direction, after.direction);
    assert!(engine.time_of_day().unwrap().minute() > 600.0);
}

// ── Shading math ────────────────────────────────────────────────────────────

#[test]
fn attenuation_is_one_at_the_light() {
    assert_eq!(attenuation(0.3, 0.7, 0.0), 1.0);
    assert!(attenuation(0.3, 0.7, 10.0) < 1.0);
    assert!(attenuation(0.0, 0.0, 1e6) == 1.0);
}

#[test]
fn spot_cone_excludes_surfaces_outside_the_cutoff() {
    let cutoff = spot_cutoff(std::f32::consts::FRAC_PI_6);
    let light = Vec3::new(0.0, 0.0, 100.0);
    assert!(spot_admits(light, -Vec3::Z, cutoff, Vec3::ZERO));
    assert!(!spot_admits(light, -Vec3::Z, cutoff, Vec3::new(500.0, 0.0, 0.0)));
}

#[test]
fn off_lights_contribute_nothing() {
    let mut light = LightComponent::point(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE, 0.0, 0.0);
    let on = contribution(&light.record(), Vec3::ZERO, Vec3::Z);
    light.set_off(true);
    assert!(on > 0.0);
    assert_eq!(contribution(&light.record(), Vec3::ZERO, Vec3::Z), 0.0);
}
