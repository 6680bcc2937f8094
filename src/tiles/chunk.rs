use glam::Vec3;

use crate::completion::LoadState;
use crate::ecs::components::{ShaderComponent, TileTransform, TileVisual};
use crate::ecs::schedule::Context;
use crate::ecs::{Entity, EntityDesc, World};
use crate::renderer::{
    INSTANCE_DEBUG, INSTANCE_HEIGHT_MAP, INSTANCE_NORMAL_MAP, MeshDesc, MeshId, QuadVertex, TileInstance,
};
use crate::resources::material::{Material, MaterialId, ShaderProgram};
use crate::resources::texture_cache::ImageHandle;

use super::{CHUNK_SIZE, TILE_LAYER, TILE_SIZE, TILE_Z_INDEX};

/// Copy of a tile taken when it was added to the chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct TileSnapshot {
    pub entity: Entity,
    pub transform: TileTransform,
    pub visual: TileVisual,
}

/// GPU-side objects of a built chunk. Released together on every rebuild.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub material: MaterialId,
    /// Light consumer entity carrying the material.
    pub shader_entity: Entity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    Built,
    /// Texture still loading; the chunk stays dirty.
    Waiting,
    /// Texture failed to load; the chunk is left unbuilt for good.
    Failed,
}

pub struct Chunk {
    origin: (i32, i32),
    tiles: Vec<TileSnapshot>,
    texture_name: Option<String>,
    texture: Option<ImageHandle>,
    dirty: bool,
    failed: bool,
    visible: bool,
    renderable: Option<Renderable>,
    builds: u32,
}

impl Chunk {
    pub(crate) fn new(origin: (i32, i32)) -> Self {
        Self {
            origin,
            tiles: Vec::new(),
            texture_name: None,
            texture: None,
            dirty: true,
            failed: false,
            visible: false,
            renderable: None,
            builds: 0,
        }
    }

    /// Minimum tile corner, always a multiple of `CHUNK_SIZE`.
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (cx, cy) = self.origin;
        cx <= x && x < cx + CHUNK_SIZE && cy <= y && y < cy + CHUNK_SIZE
    }

    pub fn tiles(&self) -> &[TileSnapshot] {
        &self.tiles
    }

    pub fn texture_name(&self) -> Option<&str> {
        self.texture_name.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn renderable(&self) -> Option<&Renderable> {
        self.renderable.as_ref()
    }

    /// How many times geometry was (re)built.
    pub fn builds(&self) -> u32 {
        self.builds
    }

    /// World-space center of the chunk in pixels.
    pub fn center(&self) -> Vec3 {
        let half = 0.5 * CHUNK_SIZE as f32 * TILE_SIZE;
        Vec3::new(
            self.origin.0 as f32 * TILE_SIZE + half,
            self.origin.1 as f32 * TILE_SIZE + half,
            TILE_Z_INDEX,
        )
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Record a tile. The first tile decides the chunk's texture; the
    /// returned handle settles when that texture is available.
    pub(crate) fn add_tile(&mut self, tile: TileSnapshot, ctx: &mut Context) -> ImageHandle {
        let name = tile.visual.texture_name().to_string();
        let handle = match (&self.texture_name, &self.texture) {
            (Some(bound), Some(handle)) => {
                if *bound != name {
                    log::warn!(
                        "chunk {:?}: tile at ({}, {}) uses '{name}' but the chunk is bound to '{bound}'",
                        self.origin, tile.transform.x, tile.transform.y
                    );
                }
                handle.clone()
            }
            _ => {
                let handle = ctx.res.textures.request(&name);
                self.texture_name = Some(name);
                self.texture = Some(handle.clone());
                handle
            }
        };
        self.tiles.push(tile);
        self.dirty = true;
        handle
    }

    pub(crate) fn remove_tile(&mut self, entity: Entity) -> bool {
        let before = self.tiles.len();
        self.tiles.retain(|t| t.entity != entity);
        let removed = self.tiles.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    fn release(&mut self, world: &mut World, ctx: &mut Context) {
        if let Some(old) = self.renderable.take() {
            ctx.renderer.remove_mesh(old.mesh);
            ctx.res.materials.release(old.material);
            world.queue_despawn(old.shader_entity);
        }
        self.visible = false;
    }

    pub(crate) fn rebuild(&mut self, world: &mut World, ctx: &mut Context, debug: bool) -> RebuildOutcome {
        self.release(world, ctx);

        let Some(handle) = &self.texture else {
            // Emptied before any tile was ever added; nothing to draw.
            self.dirty = false;
            return RebuildOutcome::Built;
        };
        let name = self.texture_name.clone().unwrap_or_default();
        match handle.state() {
            LoadState::Loading => {
                log::trace!("chunk {:?}: waiting on '{name}'", self.origin);
                return RebuildOutcome::Waiting;
            }
            LoadState::Failed(err) => {
                log::error!("chunk {:?}: not built: {err}", self.origin);
                self.failed = true;
                self.dirty = false;
                return RebuildOutcome::Failed;
            }
            LoadState::Loaded(_) => {}
        }
        if self.tiles.is_empty() {
            self.dirty = false;
            return RebuildOutcome::Built;
        }
        let Some(texture) = ctx.res.textures.texture_id(&name, &mut *ctx.renderer) else {
            return RebuildOutcome::Waiting;
        };

        let instances = self.instances(&name, debug);
        let material = ctx.res.materials.create(Material::new(ShaderProgram::Tile, Some(texture)));
        let half = 0.5 * CHUNK_SIZE as f32 * TILE_SIZE;
        let mesh = ctx.renderer.add_mesh(MeshDesc {
            label: format!("chunk({},{})", self.origin.0, self.origin.1),
            vertices: QuadVertex::quad(-half, TILE_SIZE).to_vec(),
            instances,
            position: self.center(),
            material,
        });
        let shader_entity = world.spawn_deferred(EntityDesc::shader(ShaderComponent { material }));

        log::debug!(
            "chunk {:?}: built {} tiles (build #{})",
            self.origin,
            self.tiles.len(),
            self.builds + 1
        );
        self.renderable = Some(Renderable { mesh, material, shader_entity });
        self.builds += 1;
        self.dirty = false;
        RebuildOutcome::Built
    }

    fn instances(&self, texture_name: &str, debug: bool) -> Vec<TileInstance> {
        self.tiles
            .iter()
            .map(|tile| {
                let visual = &tile.visual;
                let mut flags = if debug { INSTANCE_DEBUG } else { 0 };
                let mut normal_uv = [0.0; 4];
                let mut height_uv = [0.0; 4];
                if let Some(n) = visual.normal.as_ref().filter(|n| n.name == texture_name) {
                    normal_uv = n.uv.to_array();
                    flags |= INSTANCE_NORMAL_MAP;
                }
                if let Some(h) = visual.height.as_ref().filter(|h| h.name == texture_name) {
                    height_uv = h.uv.to_array();
                    flags |= INSTANCE_HEIGHT_MAP;
                }
                TileInstance {
                    offset: [
                        (tile.transform.x - self.origin.0) as f32 * TILE_SIZE,
                        (tile.transform.y - self.origin.1) as f32 * TILE_SIZE,
                    ],
                    ambient: visual.ambient,
                    flags,
                    diffuse_uv: visual.diffuse.uv.to_array(),
                    normal_uv,
                    height_uv,
                }
            })
            .collect()
    }

    /// Apply a visibility decision. Only layer membership changes.
    pub(crate) fn set_visible(&mut self, visible: bool, ctx: &mut Context) {
        if visible == self.visible {
            return;
        }
        if let Some(r) = &self.renderable {
            ctx.renderer.set_layer_enabled(r.mesh, TILE_LAYER, visible);
            self.visible = visible;
        }
    }

    pub(crate) fn teardown(&mut self, world: &mut World, ctx: &mut Context) {
        self.release(world, ctx);
    }
}
