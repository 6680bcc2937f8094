use glam::Vec2;

use crate::resources::material::MaterialId;

pub use crate::lighting::light::{LightComponent, LightKind};

/// Integer world position of a tile, in tile units. Tiles never move.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileTransform {
    pub x: i32,
    pub y: i32,
}

impl TileTransform {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Sub-rectangle of a texture in normalized texture space (v points down).
///
/// `bottom_left.y` is therefore the larger v of the two corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvRect {
    pub bottom_left: Vec2,
    pub top_right: Vec2,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: Self = Self {
        bottom_left: Vec2::new(0.0, 1.0),
        top_right: Vec2::new(1.0, 0.0),
    };

    /// UV rect of a `w`×`h` pixel region at `(x, y)` (top-left) inside an
    /// `atlas_w`×`atlas_h` image.
    pub fn from_pixels(x: u32, y: u32, w: u32, h: u32, atlas_w: u32, atlas_h: u32) -> Self {
        let aw = atlas_w as f32;
        let ah = atlas_h as f32;
        Self {
            bottom_left: Vec2::new(x as f32 / aw, (y + h) as f32 / ah),
            top_right: Vec2::new((x + w) as f32 / aw, y as f32 / ah),
        }
    }

    /// Packed as `[bl.x, bl.y, tr.x, tr.y]` for instance attributes.
    pub fn to_array(self) -> [f32; 4] {
        [self.bottom_left.x, self.bottom_left.y, self.top_right.x, self.top_right.y]
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// One named texture used by a tile.
///
/// Before packing, `name == uri` and `uv` covers the source (or its tileset
/// crop). After packing, `name` is the atlas identifier and `uv` points into it.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRef {
    pub name: String,
    pub uri: String,
    /// Top-left pixel of a tile-sized region inside a tileset image.
    pub crop: Option<[u32; 2]>,
    pub uv: UvRect,
}

impl TextureRef {
    pub fn new(uri: &str) -> Self {
        Self { name: uri.to_string(), uri: uri.to_string(), crop: None, uv: UvRect::FULL }
    }

    pub fn cropped(uri: &str, x: u32, y: u32) -> Self {
        Self { crop: Some([x, y]), ..Self::new(uri) }
    }
}

/// Visual description of a tile: diffuse plus optional normal and height maps.
#[derive(Clone, Debug, PartialEq)]
pub struct TileVisual {
    pub diffuse: TextureRef,
    pub normal: Option<TextureRef>,
    pub height: Option<TextureRef>,
    /// Ambient reflection coefficient.
    pub ambient: f32,
}

impl TileVisual {
    pub const DEFAULT_AMBIENT: f32 = 0.2;

    pub fn new(diffuse: TextureRef) -> Self {
        Self { diffuse, normal: None, height: None, ambient: Self::DEFAULT_AMBIENT }
    }

    pub fn with_normal(mut self, normal: TextureRef) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_height(mut self, height: TextureRef) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_ambient(mut self, ambient: f32) -> Self {
        self.ambient = ambient;
        self
    }

    /// Logical name of the texture the tile's chunk must bind.
    pub fn texture_name(&self) -> &str {
        &self.diffuse.name
    }

    pub fn texture_refs(&self) -> impl Iterator<Item = &TextureRef> {
        std::iter::once(&self.diffuse)
            .chain(self.normal.iter())
            .chain(self.height.iter())
    }

    pub fn texture_refs_mut(&mut self) -> impl Iterator<Item = &mut TextureRef> {
        std::iter::once(&mut self.diffuse)
            .chain(self.normal.iter_mut())
            .chain(self.height.iter_mut())
    }
}

/// Marks an entity as a light consumer: its material receives light arrays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShaderComponent {
    pub material: MaterialId,
}

/// Owned by the time-of-day system's sun entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SunComponent {
    /// Minutes into the two-day cycle.
    pub time_of_day: f32,
}
