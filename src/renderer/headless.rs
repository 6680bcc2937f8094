use std::collections::HashMap;

use image::RgbaImage;

use crate::camera::Camera;
use crate::error::EngineResult;
use crate::resources::material::MaterialStore;

use super::{MeshDesc, MeshId, MeshUniforms, SceneRenderer, TextureId};

struct HeadlessMesh {
    desc: MeshDesc,
    layers: u32,
    uploaded_revision: Option<u64>,
    uniforms: Option<MeshUniforms>,
}

/// Renderer that keeps scene state in memory and never touches a GPU.
///
/// Tracks exactly what a real backend would hold live, so leaks of meshes or
/// textures across rebuilds are observable in tests.
#[derive(Default)]
pub struct HeadlessRenderer {
    next_id: u32,
    meshes: HashMap<MeshId, HeadlessMesh>,
    textures: HashMap<TextureId, (String, u32, u32)>,
    frames: u64,
    last_drawn: Vec<MeshId>,
    uniform_uploads: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshDesc> {
        self.meshes.get(&id).map(|m| &m.desc)
    }

    /// Uniform block packed for `id` at its last upload, as the GPU would see it.
    pub fn uniforms(&self, id: MeshId) -> Option<&MeshUniforms> {
        self.meshes.get(&id).and_then(|m| m.uniforms.as_ref())
    }

    pub fn layer_enabled(&self, id: MeshId, layer: u32) -> bool {
        self.meshes.get(&id).is_some_and(|m| m.layers & (1 << layer) != 0)
    }

    pub fn texture_name(&self, id: TextureId) -> Option<&str> {
        self.textures.get(&id).map(|(name, _, _)| name.as_str())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Meshes drawn by the last `draw` call, in id order.
    pub fn last_drawn(&self) -> &[MeshId] {
        &self.last_drawn
    }

    /// How many times a mesh's light uniforms were (re)built.
    pub fn uniform_uploads(&self) -> u64 {
        self.uniform_uploads
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn upload_texture(&mut self, name: &str, image: &RgbaImage) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, (name.to_string(), image.width(), image.height()));
        id
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn add_mesh(&mut self, desc: MeshDesc) -> MeshId {
        let id = MeshId(self.next());
        self.meshes.insert(id, HeadlessMesh { desc, layers: 0, uploaded_revision: None, uniforms: None });
        id
    }

    fn remove_mesh(&mut self, id: MeshId) {
        self.meshes.remove(&id);
    }

    fn set_layer_enabled(&mut self, mesh: MeshId, layer: u32, enabled: bool) {
        if let Some(m) = self.meshes.get_mut(&mesh) {
            if enabled {
                m.layers |= 1 << layer;
            } else {
                m.layers &= !(1 << layer);
            }
        }
    }

    fn draw(&mut self, materials: &MaterialStore, camera: &Camera) -> EngineResult<()> {
        self.frames += 1;
        self.last_drawn.clear();
        let mut uploads = 0;
        for (id, mesh) in self.meshes.iter_mut() {
            if mesh.layers & camera.layers() == 0 {
                continue;
            }
            let Some(material) = materials.get(mesh.desc.material) else { continue };
            if mesh.uploaded_revision != Some(material.revision()) {
                mesh.uniforms = Some(MeshUniforms::new(mesh.desc.position, &material.uniforms));
                mesh.uploaded_revision = Some(material.revision());
                uploads += 1;
            }
            self.last_drawn.push(*id);
        }
        self.uniform_uploads += uploads;
        self.last_drawn.sort_by_key(|id| id.0);
        Ok(())
    }
}
