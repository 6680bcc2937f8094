pub mod material;
pub mod texture_cache;

use crate::camera::Camera;
use crate::renderer::SceneRenderer;

use material::MaterialStore;
use texture_cache::TextureCache;

/// Process-wide shared state handed to systems through
/// [`crate::ecs::schedule::Context`].
#[derive(Default)]
pub struct Resources {
    pub textures: TextureCache,
    pub materials: MaterialStore,
    pub camera: Camera,
}

impl Resources {
    pub fn new(textures: TextureCache, camera: Camera) -> Self {
        Self { textures, materials: MaterialStore::new(), camera }
    }

    /// Free GPU-side resources owned by the cache.
    pub fn teardown(&mut self, renderer: &mut dyn SceneRenderer) {
        self.textures.release_all(renderer);
        self.materials = MaterialStore::new();
    }
}
