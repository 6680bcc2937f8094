use glam::{Mat4, Vec2, Vec3};

use crate::tiles::culling::Frustum;

/// Camera uniform uploaded to the GPU: the combined view-projection matrix,
/// column-major to match WGSL `mat4x4<f32>`.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Orthographic 2D camera over a y-up world measured in pixels.
///
/// The visible rectangle is `position ± half_extents / zoom`. Only meshes on
/// a layer enabled in the camera's mask are drawn.
#[derive(Clone, Debug)]
pub struct Camera {
    /// World-space pixel position the camera is centered on. z only matters
    /// for near/far clipping.
    pub position: Vec3,
    /// Current zoom level (1.0 = 1:1, >1 zooms in, <1 zooms out).
    pub zoom: f32,
    /// Smooth-zoom lerp target; `set_zoom` writes here.
    pub(crate) target_zoom: f32,
    half_extents: Vec2,
    layers: u32,
}

impl Camera {
    pub const DEFAULT_Z: f32 = 50.0;
    const NEAR: f32 = 0.1;
    const FAR: f32 = 1000.0;
    const MIN_ZOOM: f32 = 0.05;

    /// Camera centered on the world origin showing a `width`×`height` pixel
    /// viewport at zoom 1. Layer 0 is enabled.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, Self::DEFAULT_Z),
            zoom: 1.0,
            target_zoom: 1.0,
            half_extents: Vec2::new(width * 0.5, height * 0.5),
            layers: 1,
        }
    }

    /// Advance the smooth zoom toward its target (converges at ~8× per second).
    pub fn tick(&mut self, dt: f32) {
        let speed = 8.0_f32;
        self.zoom += (self.target_zoom - self.zoom) * (speed * dt).min(1.0);
    }

    /// Set the zoom target, clamped to a small positive minimum.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.target_zoom = zoom.max(Self::MIN_ZOOM);
    }

    /// Jump straight to `zoom` with no lerp.
    pub fn snap_zoom(&mut self, zoom: f32) {
        self.set_zoom(zoom);
        self.zoom = self.target_zoom;
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.position.x += dx;
        self.position.y += dy;
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.half_extents = Vec2::new(width * 0.5, height * 0.5);
    }

    pub fn half_extents(&self) -> Vec2 {
        self.half_extents / self.zoom.max(Self::MIN_ZOOM)
    }

    pub fn enable_layer(&mut self, layer: u32) {
        self.layers |= 1 << layer;
    }

    pub fn disable_layer(&mut self, layer: u32) {
        self.layers &= !(1 << layer);
    }

    pub fn layer_enabled(&self, layer: u32) -> bool {
        self.layers & (1 << layer) != 0
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Visible world rectangle.
    pub fn frustum(&self) -> Frustum {
        let half = self.half_extents();
        Frustum {
            top: self.position.y + half.y,
            right: self.position.x + half.x,
            bottom: self.position.y - half.y,
            left: self.position.x - half.x,
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let half = self.half_extents();
        let proj = Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, Self::NEAR, Self::FAR);
        let view = Mat4::from_translation(-self.position);
        proj * view
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform { view_proj: self.view_proj().to_cols_array_2d() }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}
