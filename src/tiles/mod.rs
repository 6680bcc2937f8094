// =============================================================================
// TILES — chunked tile store
//
// The map is unbounded, so tiles are grouped into square chunks of
// CHUNK_SIZE × CHUNK_SIZE tiles. A chunk is the unit of geometry rebuild and of
// visibility culling. Chunks are created on first insertion and never removed.
// =============================================================================

pub mod chunk;
pub mod culling;

use crate::completion::Completion;
use crate::ecs::components::{TileTransform, TileVisual};
use crate::ecs::schedule::{Context, EntityObserver, Filterable, FrameAdvance, System};
use crate::ecs::{ComponentKind, Entity, Filter, World};
use crate::error::EngineResult;

use chunk::{Chunk, RebuildOutcome, TileSnapshot};

/// Tiles per chunk side.
pub const CHUNK_SIZE: i32 = 8;
/// Tile side length in world pixels.
pub const TILE_SIZE: f32 = 30.0;
/// Side of one tile in source/atlas textures, in texels.
pub const TILE_TEXTURE_PX: u32 = 16;
/// Depth at which tile meshes sit.
pub const TILE_Z_INDEX: f32 = 1.0;
/// Render layer toggled by the culler.
pub const TILE_LAYER: u32 = 2;

/// Chunk origin for a tile: floor-aligned to `CHUNK_SIZE` on both axes, so
/// `(-1, -1)` belongs to the chunk at `(-8, -8)`.
pub fn chunk_origin(x: i32, y: i32) -> (i32, i32) {
    (x.div_euclid(CHUNK_SIZE) * CHUNK_SIZE, y.div_euclid(CHUNK_SIZE) * CHUNK_SIZE)
}

#[derive(Default)]
pub struct TileSystem {
    chunks: Vec<Chunk>,
    debug_outline: bool,
}

impl TileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the chunk containing `(x, y)`. Linear in the number of chunks.
    pub fn locate_chunk_containing(&self, x: i32, y: i32) -> Option<usize> {
        self.chunks.iter().position(|c| c.contains(x, y))
    }

    pub fn create_chunk_containing(&mut self, x: i32, y: i32) -> usize {
        let origin = chunk_origin(x, y);
        log::debug!("tiles: new chunk at {origin:?} for ({x}, {y})");
        self.chunks.push(Chunk::new(origin));
        self.chunks.len() - 1
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn chunk_at(&self, x: i32, y: i32) -> Option<&Chunk> {
        self.locate_chunk_containing(x, y).map(|i| &self.chunks[i])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Forward a tile to its chunk (creating it if needed). The completion
    /// settles once the chunk's texture has loaded.
    pub fn add_tile(&mut self, tile: TileSnapshot, ctx: &mut Context) -> Completion {
        let TileTransform { x, y } = tile.transform;
        let index = match self.locate_chunk_containing(x, y) {
            Some(i) => i,
            None => self.create_chunk_containing(x, y),
        };
        self.chunks[index].add_tile(tile, ctx).completion()
    }

    pub fn debug_outline(&self) -> bool {
        self.debug_outline
    }

    /// Toggle the chunk-border overlay. Every chunk is rebuilt.
    pub fn set_debug_outline(&mut self, enabled: bool) {
        if self.debug_outline == enabled {
            return;
        }
        self.debug_outline = enabled;
        for chunk in &mut self.chunks {
            chunk.mark_dirty();
        }
    }

    /// Release every chunk's GPU objects.
    pub fn teardown(&mut self, world: &mut World, ctx: &mut Context) {
        for chunk in &mut self.chunks {
            chunk.teardown(world, ctx);
        }
    }
}

impl Filterable for TileSystem {
    fn filter(&self) -> Filter {
        Filter::require_all(&[ComponentKind::TileTransform, ComponentKind::TileVisual])
    }
}

impl EntityObserver for TileSystem {
    fn on_add(&mut self, entity: Entity, world: &mut World, ctx: &mut Context) -> Completion {
        let (Some(transform), Some(visual)) = (
            world.get::<TileTransform>(entity).copied(),
            world.get::<TileVisual>(entity).cloned(),
        ) else {
            return Completion::done();
        };
        self.add_tile(TileSnapshot { entity, transform, visual }, ctx)
    }

    fn on_remove(&mut self, entity: Entity, world: &mut World, _ctx: &mut Context) {
        let Some(t) = world.get::<TileTransform>(entity).copied() else { return };
        if let Some(i) = self.locate_chunk_containing(t.x, t.y) {
            self.chunks[i].remove_tile(entity);
        }
    }
}

impl FrameAdvance for TileSystem {
    fn advance(&mut self, _dt: f32, world: &mut World, ctx: &mut Context) -> EngineResult<()> {
        let frustum = ctx.res.camera.frustum();
        let debug = self.debug_outline;
        for chunk in &mut self.chunks {
            if chunk.is_dirty() && !chunk.is_failed() {
                if chunk.rebuild(world, ctx, debug) == RebuildOutcome::Waiting {
                    continue;
                }
            }
            let visible = frustum.contains_chunk(chunk.origin());
            chunk.set_visible(visible, ctx);
        }
        Ok(())
    }
}

impl System for TileSystem {
    fn name(&self) -> &'static str {
        "tiles"
    }

    fn on_add_to_world(&mut self, _world: &mut World, ctx: &mut Context) {
        ctx.res.camera.enable_layer(TILE_LAYER);
    }
}
