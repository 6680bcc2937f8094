// =============================================================================
// MAP — JSON map data to tile and light entities
//
// Loading is a small pipeline polled once per frame:
//   parse → lay out the grid around the origin → pack every texture the map
//   uses into one atlas (sources fetched one at a time) → register the atlas
//   image with the texture cache → hand entity descriptions to the engine.
// =============================================================================

use std::collections::HashMap;

use glam::Vec3;
use serde::Deserialize;

use crate::atlas::{PackStatus, TexturePacker};
use crate::ecs::EntityDesc;
use crate::ecs::components::{TextureRef, TileTransform, TileVisual};
use crate::error::ResourceError;
use crate::lighting::light::{LightComponent, LightKind};
use crate::renderer::max_lights;
use crate::resources::texture_cache::TextureCache;
use crate::tiles::{TILE_SIZE, TILE_TEXTURE_PX};

// ── Data model ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    /// Symbol grid; row 0 is the northernmost row.
    pub tiles: Vec<Vec<String>>,
    #[serde(default)]
    pub tile_types: HashMap<String, TileType>,
    #[serde(default)]
    pub object_types: HashMap<String, ObjectType>,
}

/// Ground tile cut from a tileset.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileType {
    /// Tileset image.
    pub texture: String,
    /// Pixel offset of the tile inside the tileset.
    #[serde(default)]
    pub x_texture_coords: u32,
    #[serde(default)]
    pub y_texture_coords: u32,
    /// Whole-image diffuse map, replacing the tileset crop.
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub material: Option<MaterialData>,
}

/// Single-tile object with its own maps and an optional lamp.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub diffuse: String,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub material: Option<MaterialData>,
    #[serde(default)]
    pub point_light: Option<PointLightData>,
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialData {
    #[serde(default = "MaterialData::default_ambient")]
    pub ambient: f32,
}

impl MaterialData {
    fn default_ambient() -> f32 {
        TileVisual::DEFAULT_AMBIENT
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointLightData {
    /// z of the lamp above the tile plane.
    pub height: f32,
    pub color: [f32; 3],
    #[serde(default)]
    pub a_attenuation: f32,
    #[serde(default)]
    pub b_attenuation: f32,
    /// Explicit slot in the point-light arrays.
    #[serde(default)]
    pub index: Option<u32>,
}

pub fn parse_map(json: &str) -> Result<MapData, ResourceError> {
    serde_json::from_str(json).map_err(|e| ResourceError::MalformedMapData(e.to_string()))
}

// ── Layout ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedTile {
    pub transform: TileTransform,
    pub visual: TileVisual,
    pub light: Option<LightComponent>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapLayout {
    pub tiles: Vec<PlacedTile>,
    /// Grid cells whose symbol has no type, as `(row, column, symbol)`.
    pub skipped: Vec<(usize, usize, String)>,
}

impl MapLayout {
    pub fn light_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.light.is_some()).count()
    }
}

/// World tile coordinate of a grid cell. The grid is centered on the origin
/// and its rows are flipped so that y grows northward.
pub fn grid_to_world(row: usize, column: usize, rows: usize, width: usize) -> (i32, i32) {
    let x = column as i32 - (width as i32).div_euclid(2);
    let y = (rows as i32 - 1 - row as i32) - (rows as i32).div_euclid(2);
    (x, y)
}

fn tile_visual(ty: &TileType) -> TileVisual {
    let crop = |uri: &str| TextureRef::cropped(uri, ty.x_texture_coords, ty.y_texture_coords);
    let (diffuse, normal, height) = match &ty.diffuse {
        Some(uri) => (
            TextureRef::new(uri),
            ty.normal.as_deref().map(TextureRef::new),
            ty.height.as_deref().map(TextureRef::new),
        ),
        None => (
            crop(&ty.texture),
            ty.normal.as_deref().map(crop),
            ty.height.as_deref().map(crop),
        ),
    };
    let ambient = ty.material.map_or(TileVisual::DEFAULT_AMBIENT, |m| m.ambient);
    TileVisual { diffuse, normal, height, ambient }
}

fn object_visual(obj: &ObjectType) -> TileVisual {
    TileVisual {
        diffuse: TextureRef::new(&obj.diffuse),
        normal: obj.normal.as_deref().map(TextureRef::new),
        height: obj.height.as_deref().map(TextureRef::new),
        ambient: obj.material.map_or(TileVisual::DEFAULT_AMBIENT, |m| m.ambient),
    }
}

fn object_light(data: &PointLightData, (x, y): (i32, i32)) -> LightComponent {
    let center = Vec3::new(
        x as f32 * TILE_SIZE + 0.5 * TILE_SIZE,
        y as f32 * TILE_SIZE + 0.5 * TILE_SIZE,
        data.height,
    );
    let light = LightComponent::point(center, Vec3::from_array(data.color), data.a_attenuation, data.b_attenuation);
    match data.index {
        Some(slot) if slot < max_lights(LightKind::Point) => light.with_slot(slot),
        Some(slot) => {
            let err = ResourceError::MalformedMapData(format!(
                "point light index {slot} at ({x}, {y}) exceeds {} slots",
                max_lights(LightKind::Point)
            ));
            log::warn!("{err}; index ignored");
            light
        }
        None => light,
    }
}

/// Resolve every grid symbol. Unknown symbols are skipped with a warning;
/// empty cells are skipped quietly.
pub fn layout(map: &MapData) -> MapLayout {
    let rows = map.tiles.len();
    let width = map.tiles.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = MapLayout::default();

    for (row, cells) in map.tiles.iter().enumerate() {
        for (column, symbol) in cells.iter().enumerate() {
            if symbol.trim().is_empty() {
                continue;
            }
            let (x, y) = grid_to_world(row, column, rows, width);
            let transform = TileTransform::new(x, y);
            if let Some(ty) = map.tile_types.get(symbol) {
                out.tiles.push(PlacedTile { transform, visual: tile_visual(ty), light: None });
            } else if let Some(obj) = map.object_types.get(symbol) {
                let light = obj.point_light.as_ref().map(|l| object_light(l, (x, y)));
                out.tiles.push(PlacedTile { transform, visual: object_visual(obj), light });
            } else {
                let err = ResourceError::MalformedMapData(format!("unknown symbol '{symbol}' at row {row}, column {column}"));
                log::warn!("{err}; skipped");
                out.skipped.push((row, column, symbol.clone()));
            }
        }
    }
    out
}

// ── Load job ────────────────────────────────────────────────────────────────

/// Summary of a finished map load.
#[derive(Clone, Debug, PartialEq)]
pub struct MapReport {
    pub atlas: String,
    pub tiles: usize,
    pub lights: usize,
    pub skipped: usize,
}

/// Entities ready to be added once the atlas exists.
#[derive(Debug)]
pub struct LoadedMap {
    pub report: MapReport,
    pub entities: Vec<EntityDesc>,
}

pub struct MapLoad {
    placements: Vec<(TileTransform, Option<LightComponent>)>,
    skipped: usize,
    packer: TexturePacker,
    finished: bool,
}

impl MapLoad {
    pub fn new(layout: MapLayout, atlas_name: &str) -> Self {
        let skipped = layout.skipped.len();
        let (placements, records): (Vec<_>, Vec<_>) = layout
            .tiles
            .into_iter()
            .map(|t| ((t.transform, t.light), t.visual))
            .unzip();
        Self {
            placements,
            skipped,
            packer: TexturePacker::new(atlas_name, records, TILE_TEXTURE_PX),
            finished: false,
        }
    }

    pub fn atlas_name(&self) -> &str {
        self.packer.name()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drive the atlas. Returns the entities once, after the atlas image has
    /// been registered with `cache` under the atlas name.
    pub fn poll(&mut self, cache: &mut TextureCache) -> Result<Option<LoadedMap>, ResourceError> {
        if self.finished {
            return Ok(None);
        }
        let atlas = match self.packer.poll(cache)? {
            PackStatus::Pending => return Ok(None),
            PackStatus::Done(atlas) => atlas,
        };
        self.finished = true;
        cache.insert(&atlas.name, atlas.image);

        let placements = std::mem::take(&mut self.placements);
        let mut lights = 0;
        let entities: Vec<EntityDesc> = placements
            .into_iter()
            .zip(atlas.records)
            .map(|((transform, light), visual)| {
                lights += usize::from(light.is_some());
                EntityDesc { light, ..EntityDesc::tile(transform, visual) }
            })
            .collect();

        let report = MapReport { atlas: atlas.name, tiles: entities.len(), lights, skipped: self.skipped };
        log::info!(
            "map loaded: {} tiles, {} lights, {} skipped, atlas '{}'",
            report.tiles, report.lights, report.skipped, report.atlas
        );
        Ok(Some(LoadedMap { report, entities }))
    }
}
