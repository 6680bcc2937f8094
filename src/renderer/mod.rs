pub mod headless;
pub mod pipeline;
pub mod wgpu_renderer;

use glam::Vec3;
use image::RgbaImage;

use crate::camera::Camera;
use crate::error::EngineResult;
use crate::lighting::light::{LightKind, LightRecord};
use crate::resources::material::{MaterialId, MaterialStore, Uniforms};

pub use headless::HeadlessRenderer;
pub use wgpu_renderer::WgpuRenderer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// What the scene needs from a renderer. Meshes are created hidden: no layer
/// is enabled until `set_layer_enabled` is called.
pub trait SceneRenderer {
    fn upload_texture(&mut self, name: &str, image: &RgbaImage) -> TextureId;
    /// Frees the GPU texture immediately.
    fn release_texture(&mut self, id: TextureId);
    fn add_mesh(&mut self, desc: MeshDesc) -> MeshId;
    /// Frees the mesh's vertex, instance and uniform buffers immediately.
    fn remove_mesh(&mut self, id: MeshId);
    fn set_layer_enabled(&mut self, mesh: MeshId, layer: u32, enabled: bool);
    /// Draw every mesh sharing a layer with the camera.
    fn draw(&mut self, materials: &MaterialStore, camera: &Camera) -> EngineResult<()>;
}

// ── Vertex / instance layouts ───────────────────────────────────────────────

/// Corner of the shared base quad. `uv` is the unit-square coordinate the
/// shader maps into each instance's UV rectangle.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,  // position
        1 => Float32x2,  // uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }

    /// Two triangles covering `[min, min + size]` on both axes.
    pub fn quad(min: f32, size: f32) -> [QuadVertex; 6] {
        let max = min + size;
        let bl = QuadVertex { position: [min, min], uv: [0.0, 0.0] };
        let br = QuadVertex { position: [max, min], uv: [1.0, 0.0] };
        let tl = QuadVertex { position: [min, max], uv: [0.0, 1.0] };
        let tr = QuadVertex { position: [max, max], uv: [1.0, 1.0] };
        [bl, br, tl, tl, br, tr]
    }
}

pub const INSTANCE_NORMAL_MAP: u32 = 1 << 0;
pub const INSTANCE_HEIGHT_MAP: u32 = 1 << 1;
pub const INSTANCE_DEBUG: u32 = 1 << 2;

/// Per-tile attributes of an instanced chunk mesh. UV rects are packed as
/// `[bottom_left.x, bottom_left.y, top_right.x, top_right.y]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileInstance {
    /// Tile position relative to the chunk origin, in pixels.
    pub offset: [f32; 2],
    pub ambient: f32,
    pub flags: u32,
    pub diffuse_uv: [f32; 4],
    pub normal_uv: [f32; 4],
    pub height_uv: [f32; 4],
}

impl TileInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        2 => Float32x2,  // offset
        3 => Float32,    // ambient
        4 => Uint32,     // flags
        5 => Float32x4,  // diffuse_uv
        6 => Float32x4,  // normal_uv
        7 => Float32x4,  // height_uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Everything needed to create one instanced mesh.
#[derive(Clone, Debug)]
pub struct MeshDesc {
    pub label: String,
    pub vertices: Vec<QuadVertex>,
    pub instances: Vec<TileInstance>,
    /// World-space translation of the mesh.
    pub position: Vec3,
    pub material: MaterialId,
}

// ── Light uniforms ──────────────────────────────────────────────────────────

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;
pub const MAX_SPOT_LIGHTS: usize = 8;

pub fn max_lights(kind: LightKind) -> u32 {
    match kind {
        LightKind::Directional => MAX_DIRECTIONAL_LIGHTS as u32,
        LightKind::Point => MAX_POINT_LIGHTS as u32,
        LightKind::Spot => MAX_SPOT_LIGHTS as u32,
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuDirectionalLight {
    pub direction: [f32; 4],
    /// rgb, w = 1 when on.
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 4],
    pub color: [f32; 4],
    /// a, b, on, unused.
    pub attenuation: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuSpotLight {
    pub position: [f32; 4],
    /// xyz direction, w = cosine cutoff.
    pub direction: [f32; 4],
    pub color: [f32; 4],
    /// a, b, on, unused.
    pub attenuation: [f32; 4],
}

/// Per-mesh uniform block: model translation plus the three light arrays.
/// Field order and sizes follow the WGSL `MeshUniforms` struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshUniforms {
    pub model: [f32; 4],
    /// directional, point, spot, unused.
    pub counts: [u32; 4],
    pub directional: [GpuDirectionalLight; MAX_DIRECTIONAL_LIGHTS],
    pub point: [GpuPointLight; MAX_POINT_LIGHTS],
    pub spot: [GpuSpotLight; MAX_SPOT_LIGHTS],
}

fn on(record: &LightRecord) -> f32 {
    if record.off { 0.0 } else { 1.0 }
}

impl MeshUniforms {
    pub fn new(position: Vec3, uniforms: &Uniforms) -> Self {
        let mut out: MeshUniforms = bytemuck::Zeroable::zeroed();
        out.model = [position.x, position.y, position.z, 1.0];

        if let Some(array) = uniforms.light_array(LightKind::Directional) {
            for (slot, r) in array.slots().filter(|(s, _)| (*s as usize) < MAX_DIRECTIONAL_LIGHTS) {
                out.directional[slot as usize] = GpuDirectionalLight {
                    direction: r.direction.extend(0.0).to_array(),
                    color: r.color.extend(on(r)).to_array(),
                };
            }
            out.counts[0] = array.len().min(MAX_DIRECTIONAL_LIGHTS) as u32;
        }
        if let Some(array) = uniforms.light_array(LightKind::Point) {
            for (slot, r) in array.slots().filter(|(s, _)| (*s as usize) < MAX_POINT_LIGHTS) {
                out.point[slot as usize] = GpuPointLight {
                    position: r.position.extend(1.0).to_array(),
                    color: r.color.extend(1.0).to_array(),
                    attenuation: [r.a_attenuation, r.b_attenuation, on(r), 0.0],
                };
            }
            out.counts[1] = array.len().min(MAX_POINT_LIGHTS) as u32;
        }
        if let Some(array) = uniforms.light_array(LightKind::Spot) {
            for (slot, r) in array.slots().filter(|(s, _)| (*s as usize) < MAX_SPOT_LIGHTS) {
                out.spot[slot as usize] = GpuSpotLight {
                    position: r.position.extend(1.0).to_array(),
                    direction: r.direction.extend(r.cutoff).to_array(),
                    color: r.color.extend(1.0).to_array(),
                    attenuation: [r.a_attenuation, r.b_attenuation, on(r), 0.0],
                };
            }
            out.counts[2] = array.len().min(MAX_SPOT_LIGHTS) as u32;
        }
        out
    }
}
