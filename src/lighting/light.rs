use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [LightKind::Directional, LightKind::Point, LightKind::Spot];

    /// Name of the uniform array this kind is written into.
    pub fn uniform_name(self) -> &'static str {
        match self {
            LightKind::Directional => "directionalLights",
            LightKind::Point => "pointLights",
            LightKind::Spot => "spotLights",
        }
    }

    /// Per-record fields a shader expects for this kind.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            LightKind::Directional => &["direction", "color"],
            LightKind::Point => &["position", "color", "aAttenuation", "bAttenuation"],
            LightKind::Spot => &[
                "direction",
                "angle",
                "color",
                "position",
                "aAttenuation",
                "bAttenuation",
            ],
        }
    }
}

/// A light source. One component kind for all three variants, tagged by
/// [`LightKind`].
///
/// Every setter marks the light dirty; the lighting registry for its kind
/// decides what happens to the flag after propagation.
#[derive(Clone, Debug, PartialEq)]
pub struct LightComponent {
    kind: LightKind,
    position: Vec3,
    direction: Vec3,
    color: Vec3,
    a_attenuation: f32,
    b_attenuation: f32,
    /// Cosine of the spot half-angle.
    cutoff: f32,
    off: bool,
    dirty: bool,
    slot: Option<u32>,
}

impl LightComponent {
    fn base(kind: LightKind) -> Self {
        Self {
            kind,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            color: Vec3::ONE,
            a_attenuation: 0.0,
            b_attenuation: 0.0,
            cutoff: -1.0,
            off: false,
            dirty: true,
            slot: None,
        }
    }

    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Self { direction, color, ..Self::base(LightKind::Directional) }
    }

    pub fn point(position: Vec3, color: Vec3, a_attenuation: f32, b_attenuation: f32) -> Self {
        Self { position, color, a_attenuation, b_attenuation, ..Self::base(LightKind::Point) }
    }

    /// `half_angle` in radians; stored as its cosine.
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        half_angle: f32,
        color: Vec3,
        a_attenuation: f32,
        b_attenuation: f32,
    ) -> Self {
        Self {
            position,
            direction,
            color,
            a_attenuation,
            b_attenuation,
            cutoff: super::shading::spot_cutoff(half_angle),
            ..Self::base(LightKind::Spot)
        }
    }

    /// Request a specific slot in the uniform array (e.g. from map data).
    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn kind(&self) -> LightKind { self.kind }
    pub fn position(&self) -> Vec3 { self.position }
    pub fn direction(&self) -> Vec3 { self.direction }
    pub fn color(&self) -> Vec3 { self.color }
    pub fn attenuation(&self) -> (f32, f32) { (self.a_attenuation, self.b_attenuation) }
    pub fn cutoff(&self) -> f32 { self.cutoff }
    pub fn is_off(&self) -> bool { self.off }
    pub fn is_dirty(&self) -> bool { self.dirty }
    pub fn slot(&self) -> Option<u32> { self.slot }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction;
        self.dirty = true;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.dirty = true;
    }

    pub fn set_attenuation(&mut self, a: f32, b: f32) {
        self.a_attenuation = a;
        self.b_attenuation = b;
        self.dirty = true;
    }

    pub fn set_half_angle(&mut self, half_angle: f32) {
        self.cutoff = super::shading::spot_cutoff(half_angle);
        self.dirty = true;
    }

    pub fn set_off(&mut self, off: bool) {
        self.off = off;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub(crate) fn assign_slot(&mut self, slot: u32) {
        self.slot = Some(slot);
    }

    /// Snapshot written into a shader's light array.
    pub fn record(&self) -> LightRecord {
        LightRecord {
            kind: self.kind,
            position: self.position,
            direction: self.direction,
            color: self.color,
            a_attenuation: self.a_attenuation,
            b_attenuation: self.b_attenuation,
            cutoff: self.cutoff,
            off: self.off,
        }
    }
}

/// Plain-data copy of a light as seen by a shader.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightRecord {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub a_attenuation: f32,
    pub b_attenuation: f32,
    pub cutoff: f32,
    pub off: bool,
}

/// What a registry does with a light's dirty flag after writing it out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyPolicy {
    /// Light is clean until its owner changes it again.
    Clear,
    /// Light stays dirty and is re-propagated every frame.
    Persist,
}

impl DirtyPolicy {
    pub fn default_for(kind: LightKind) -> Self {
        match kind {
            LightKind::Directional => DirtyPolicy::Clear,
            LightKind::Point | LightKind::Spot => DirtyPolicy::Persist,
        }
    }
}
