use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec3;
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::Camera;
use crate::error::{EngineError, EngineResult};
use crate::resources::material::{MaterialId, MaterialStore};

use super::pipeline::{TilePipeline, create_atlas_sampler, create_tile_pipeline};
use super::{MeshDesc, MeshId, MeshUniforms, SceneRenderer, TextureId};

struct GpuTexture {
    name: String,
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct GpuMesh {
    label: String,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    position: Vec3,
    material: MaterialId,
    layers: u32,
    /// Material revision last written to `uniform_buffer`.
    uploaded_revision: Option<u64>,
}

impl GpuMesh {
    fn destroy(self) {
        self.vertex_buffer.destroy();
        self.instance_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

/// Windowed renderer: one instanced draw per visible chunk mesh.
pub struct WgpuRenderer {
    pub window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: TilePipeline,
    sampler: wgpu::Sampler,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    textures: HashMap<TextureId, GpuTexture>,
    /// Ordered so draw order is stable between frames.
    meshes: BTreeMap<MeshId, GpuMesh>,
    next_id: u32,
    clear_color: wgpu::Color,
}

fn surface_err(what: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Surface(format!("{what}: {e}"))
}

impl WgpuRenderer {
    pub async fn new(window: Arc<Window>) -> EngineResult<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|e| surface_err("create surface", e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .map_err(|e| surface_err("no suitable GPU adapter", e))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| surface_err("request device", e))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| EngineError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let pipeline = create_tile_pipeline(&device, format);
        let sampler = create_atlas_sampler(&device);

        let camera = Camera::new(config.width as f32, config.height as f32);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_buffer"),
            contents: bytemuck::cast_slice(&[camera.uniform()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bg"),
            layout: &pipeline.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        log::info!("renderer ready: {}x{} {:?}", config.width, config.height, format);
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            sampler,
            camera_buffer,
            camera_bind_group,
            textures: HashMap::new(),
            meshes: BTreeMap::new(),
            next_id: 0,
            clear_color: wgpu::Color { r: 0.02, g: 0.02, b: 0.04, a: 1.0 },
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    pub fn set_clear_color(&mut self, rgb: [f64; 3]) {
        self.clear_color = wgpu::Color { r: rgb[0], g: rgb[1], b: rgb[2], a: 1.0 };
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn render(&mut self, materials: &MaterialStore, camera: &Camera) -> Result<(), wgpu::SurfaceError> {
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera.uniform()]));

        // Re-upload light uniforms only for materials written since last frame.
        for mesh in self.meshes.values_mut() {
            if mesh.layers & camera.layers() == 0 {
                continue;
            }
            let Some(material) = materials.get(mesh.material) else { continue };
            if mesh.uploaded_revision == Some(material.revision()) {
                continue;
            }
            let uniforms = MeshUniforms::new(mesh.position, &material.uniforms);
            self.queue
                .write_buffer(&mesh.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
            mesh.uploaded_revision = Some(material.revision());
        }

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tiles"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(&self.pipeline.render_pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);

            for mesh in self.meshes.values() {
                if mesh.layers & camera.layers() == 0 || mesh.instance_count == 0 {
                    continue;
                }
                let Some(material) = materials.get(mesh.material) else { continue };
                let Some(texture) = material.texture.and_then(|id| self.textures.get(&id)) else {
                    log::trace!("mesh '{}' has no texture bound; skipped", mesh.label);
                    continue;
                };
                pass.set_bind_group(1, &texture.bind_group, &[]);
                pass.set_bind_group(2, &mesh.bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
                pass.draw(0..mesh.vertex_count, 0..mesh.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl SceneRenderer for WgpuRenderer {
    fn upload_texture(&mut self, name: &str, image: &RgbaImage) -> TextureId {
        let (width, height) = image.dimensions();
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(name),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_bg"),
            layout: &self.pipeline.atlas_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });

        let id = TextureId(self.next());
        log::debug!("uploaded texture '{name}' ({width}x{height}) as {id:?}");
        self.textures.insert(id, GpuTexture { name: name.to_string(), texture, bind_group });
        id
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(t) = self.textures.remove(&id) {
            log::debug!("released texture '{}'", t.name);
            t.texture.destroy();
        }
    }

    fn add_mesh(&mut self, desc: MeshDesc) -> MeshId {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&desc.label),
            contents: bytemuck::cast_slice(&desc.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let instance_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&desc.label),
            contents: bytemuck::cast_slice(&desc.instances),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size: std::mem::size_of::<MeshUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_bg"),
            layout: &self.pipeline.mesh_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let id = MeshId(self.next());
        self.meshes.insert(
            id,
            GpuMesh {
                label: desc.label,
                vertex_buffer,
                vertex_count: desc.vertices.len() as u32,
                instance_buffer,
                instance_count: desc.instances.len() as u32,
                uniform_buffer,
                bind_group,
                position: desc.position,
                material: desc.material,
                layers: 0,
                uploaded_revision: None,
            },
        );
        id
    }

    fn remove_mesh(&mut self, id: MeshId) {
        if let Some(mesh) = self.meshes.remove(&id) {
            mesh.destroy();
        }
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
        match self.render(materials, camera) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize(size);
                Ok(())
            }
            Err(e) => Err(surface_err("render", e)),
        }
    }
}
