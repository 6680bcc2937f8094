use image::{Rgba, RgbaImage};

use lumentile::ecs::EntityDesc;
use lumentile::ecs::components::{TextureRef, TileTransform, TileVisual};
use lumentile::resources::texture_cache::MemoryImageSource;
use lumentile::tiles::{CHUNK_SIZE, TILE_LAYER, TILE_SIZE};
use lumentile::{Engine, EngineConfig, HeadlessRenderer, Status};

fn engine() -> Engine<HeadlessRenderer> {
    let source = MemoryImageSource::new()
        .with("grass.png", RgbaImage::from_pixel(16, 16, Rgba([40, 160, 40, 255])))
        .with("stone.png", RgbaImage::from_pixel(16, 16, Rgba([128, 128, 128, 255])));
    let mut config = EngineConfig::default();
    config.time_of_day.paused = true;
    Engine::new(config, Box::new(source), HeadlessRenderer::new())
}

fn tile(x: i32, y: i32) -> EntityDesc {
    EntityDesc::tile(TileTransform::new(x, y), TileVisual::new(TextureRef::new("grass.png")))
}

fn settle(engine: &mut Engine<HeadlessRenderer>) {
    for _ in 0..3 {
        engine.advance(1.0 / 60.0).unwrap();
    }
}

#[test]
fn negative_tiles_use_floor_aligned_chunks() {
    let mut engine = engine();
    engine.add_entity(tile(-1, -1));
    engine.add_entity(tile(0, 0));
    engine.add_entity(tile(-8, 7));

    let tiles = engine.tiles().unwrap();
    let origins: Vec<(i32, i32)> = tiles.chunks().iter().map(|c| c.origin()).collect();
    assert_eq!(origins, vec![(-8, -8), (0, 0), (-8, 0)]);
    assert_eq!(tiles.chunk_at(-1, -1).unwrap().origin(), (-8, -8));
}

#[test]
fn locate_never_creates_and_is_stable() {
    let mut engine = engine();
    engine.add_entity(tile(3, 3));
    let tiles = engine.tiles().unwrap();
    let first = tiles.locate_chunk_containing(5, 5);
    assert_eq!(first, Some(0));
    assert_eq!(tiles.locate_chunk_containing(5, 5), first);
    assert_eq!(tiles.locate_chunk_containing(CHUNK_SIZE, 0), None);
    assert_eq!(tiles.chunks().len(), 1);
}

#[test]
fn completion_settles_once_the_texture_is_loaded() {
    let mut engine = engine();
    let (_, done) = engine.add_entity(tile(0, 0));
    assert_eq!(done.status(), Status::Pending);
    settle(&mut engine);
    assert!(done.is_done());
    assert!(engine.tiles().unwrap().chunk_at(0, 0).unwrap().renderable().is_some());
}

#[test]
fn chunk_with_failed_texture_stays_unbuilt() {
    let mut engine = engine();
    let (_, done) = engine.add_entity(EntityDesc::tile(
        TileTransform::new(0, 0),
        TileVisual::new(TextureRef::new("missing.png")),
    ));
    settle(&mut engine);

    assert!(matches!(done.status(), Status::Failed(_)));
    let chunk = engine.tiles().unwrap().chunk_at(0, 0).unwrap();
    assert!(chunk.is_failed());
    assert!(chunk.renderable().is_none());
    assert_eq!(engine.renderer().live_meshes(), 0);
}

#[test]
fn culling_toggles_layers_without_releasing() {
    let mut engine = engine();
    engine.add_entity(tile(0, 0));
    settle(&mut engine);

    let mesh = engine.tiles().unwrap().chunk_at(0, 0).unwrap().renderable().unwrap().mesh;
    assert!(engine.renderer().layer_enabled(mesh, TILE_LAYER));

    // Far enough that the chunk falls outside the default 1280x720 view.
    engine.camera_mut().pan(10_000.0, 0.0);
    settle(&mut engine);
    assert!(!engine.renderer().layer_enabled(mesh, TILE_LAYER));
    assert!(!engine.tiles().unwrap().chunk_at(0, 0).unwrap().is_visible());
    assert_eq!(engine.renderer().live_meshes(), 1);

    engine.camera_mut().pan(-10_000.0, 0.0);
    settle(&mut engine);
    assert!(engine.renderer().layer_enabled(mesh, TILE_LAYER));
}

#[test]
fn chunk_touching_the_view_edge_is_visible() {
    let mut engine = engine();
    // The view spans x in [-640, 640]; this chunk starts exactly at 640.
    let x = (640.0 / TILE_SIZE) as i32;
    let origin_x = x.div_euclid(CHUNK_SIZE) * CHUNK_SIZE;
    engine.add_entity(tile(x, 0));
    engine.camera_mut().pan(origin_x as f32 * TILE_SIZE - 640.0, 0.0);
    settle(&mut engine);
    assert!(engine.tiles().unwrap().chunk_at(x, 0).unwrap().is_visible());

    engine.camera_mut().pan(-1.0, 0.0);
    settle(&mut engine);
    assert!(!engine.tiles().unwrap().chunk_at(x, 0).unwrap().is_visible());
}

#[test]
fn only_visible_chunks_are_drawn() {
    let mut engine = engine();
    engine.add_entity(tile(0, 0));
    engine.add_entity(tile(200, 0));
    settle(&mut engine);
    engine.render().unwrap();

    let near = engine.tiles().unwrap().chunk_at(0, 0).unwrap().renderable().unwrap().mesh;
    assert_eq!(engine.renderer().last_drawn(), &[near]);
}

#[test]
fn rebuild_releases_previous_objects() {
    let mut engine = engine();
    engine.add_entity(tile(0, 0));
    settle(&mut engine);
    let live_entities = engine.world().len();

    for i in 1..5 {
        engine.add_entity(tile(i, 0));
        settle(&mut engine);
    }

    let chunk = engine.tiles().unwrap().chunk_at(0, 0).unwrap();
    assert_eq!(chunk.builds(), 5);
    assert_eq!(chunk.tiles().len(), 5);
    assert_eq!(engine.renderer().live_meshes(), 1);
    assert_eq!(engine.resources().materials.len(), 1);
    // Four new tiles; the shader entity was replaced, not accumulated.
    assert_eq!(engine.world().len(), live_entities + 4);
}

#[test]
fn batched_adds_rebuild_once() {
    let mut engine = engine();
    for i in 0..CHUNK_SIZE {
        engine.add_entity(tile(i, 0));
    }
    settle(&mut engine);
    assert_eq!(engine.tiles().unwrap().chunk_at(0, 0).unwrap().builds(), 1);
}

#[test]
fn removing_a_tile_rebuilds_its_chunk() {
    let mut engine = engine();
    let (a, _) = engine.add_entity(tile(0, 0));
    engine.add_entity(tile(1, 0));
    settle(&mut engine);

    engine.remove_entity(a);
    settle(&mut engine);
    let chunk = engine.tiles().unwrap().chunk_at(0, 0).unwrap();
    assert_eq!(chunk.tiles().len(), 1);
    assert_eq!(chunk.builds(), 2);
    assert_eq!(engine.renderer().live_meshes(), 1);
}

#[test]
fn debug_outline_rebuilds_every_chunk() {
    let mut engine = engine();
    engine.add_entity(tile(0, 0));
    engine.add_entity(tile(-20, 0));
    settle(&mut engine);

    engine.set_debug_outline(true);
    settle(&mut engine);
    for chunk in engine.tiles().unwrap().chunks() {
        assert_eq!(chunk.builds(), 2);
        let mesh = chunk.renderable().unwrap().mesh;
        let desc = engine.renderer().mesh(mesh).unwrap();
        assert!(desc.instances.iter().all(|i| i.flags & lumentile::renderer::INSTANCE_DEBUG != 0));
    }
    assert_eq!(engine.renderer().live_meshes(), 2);
}

#[test]
fn instance_offsets_are_relative_to_the_chunk() {
    let mut engine = engine();
    engine.add_entity(tile(-3, -5));
    settle(&mut engine);

    let chunk = engine.tiles().unwrap().chunk_at(-3, -5).unwrap();
    let desc = engine.renderer().mesh(chunk.renderable().unwrap().mesh).unwrap();
    assert_eq!(desc.instances[0].offset, [5.0 * TILE_SIZE, 3.0 * TILE_SIZE]);
    assert_eq!(desc.position, chunk.center());
}
