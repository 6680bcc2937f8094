// =============================================================================
// SHADING.RS — CPU mirror of the tile shader's lighting math
//
// The WGSL in renderer/shaders/tile.wgsl evaluates the same formulas per
// fragment; these functions exist so the numbers can be checked in tests and
// used for gameplay queries ("is this tile lit?").
// =============================================================================

use glam::Vec3;

use super::light::{LightKind, LightRecord};

/// Distance attenuation `clamp(1 / (1 + a·d + b·d²), 0, 1)`.
#[inline]
pub fn attenuation(a: f32, b: f32, distance: f32) -> f32 {
    (1.0 / (1.0 + a * distance + b * distance * distance)).clamp(0.0, 1.0)
}

/// Spot cone threshold stored in place of the raw half-angle.
#[inline]
pub fn spot_cutoff(half_angle: f32) -> f32 {
    half_angle.cos()
}

/// Whether `surface` falls inside a spot cone.
///
/// The light is excluded when
/// `dot(normalize(light - surface), normalize(-spot_direction)) < cutoff`.
pub fn spot_admits(light_position: Vec3, spot_direction: Vec3, cutoff: f32, surface: Vec3) -> bool {
    let to_light = (light_position - surface).normalize_or_zero();
    let back = (-spot_direction).normalize_or_zero();
    to_light.dot(back) >= cutoff
}

/// Lit surface position: the mesh position with z replaced by the decoded
/// height-map sample.
#[inline]
pub fn surface_position(mesh_position: Vec3, height_sample: f32) -> Vec3 {
    Vec3::new(mesh_position.x, mesh_position.y, height_sample)
}

/// Scalar contribution of one light at `surface` with unit `normal`
/// (Lambert term times attenuation, cone-gated for spots). Off lights give 0.
pub fn contribution(light: &LightRecord, surface: Vec3, normal: Vec3) -> f32 {
    if light.off {
        return 0.0;
    }
    match light.kind {
        LightKind::Directional => normal.dot(light.direction.normalize_or_zero()).max(0.0),
        LightKind::Point => {
            let to_light = light.position - surface;
            let lambert = normal.dot(to_light.normalize_or_zero()).max(0.0);
            lambert * attenuation(light.a_attenuation, light.b_attenuation, to_light.length())
        }
        LightKind::Spot => {
            if !spot_admits(light.position, light.direction, light.cutoff, surface) {
                return 0.0;
            }
            let to_light = light.position - surface;
            let lambert = normal.dot(to_light.normalize_or_zero()).max(0.0);
            lambert * attenuation(light.a_attenuation, light.b_attenuation, to_light.length())
        }
    }
}
