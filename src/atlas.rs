use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::ecs::components::{TextureRef, TileVisual, UvRect};
use crate::error::ResourceError;
use crate::resources::texture_cache::{ImageHandle, TextureCache};

// ── Strip layout (pure, GPU-free) ────────────────────────────────────────────

/// Largest atlas side. wgpu's default `max_texture_dimension_2d`.
pub const MAX_ATLAS_SIZE: u32 = 8192;

/// Side-by-side placement of `count` sources at a square `footprint`,
/// wrapping to a new row once a row would pass `max_width`.
///
/// Returns `(offsets, atlas_width, atlas_height)`. An empty input yields a
/// 1×1 canvas so an atlas always exists.
pub fn strip_layout(count: usize, footprint: u32, max_width: u32) -> (Vec<[u32; 2]>, u32, u32) {
    if count == 0 || footprint == 0 {
        return (Vec::new(), 1, 1);
    }
    let per_row = (max_width / footprint).max(1) as usize;
    let offsets = (0..count)
        .map(|i| [(i % per_row) as u32 * footprint, (i / per_row) as u32 * footprint])
        .collect();
    let columns = count.min(per_row) as u32;
    let rows = count.div_ceil(per_row) as u32;
    (offsets, columns * footprint, rows * footprint)
}

// ── Source grouping ─────────────────────────────────────────────────────────

/// A distinct source region: the whole image, or a tile-sized crop of a
/// tileset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub uri: String,
    pub crop: Option<[u32; 2]>,
}

impl SourceKey {
    fn of(texture: &TextureRef) -> Self {
        Self { uri: texture.uri.clone(), crop: texture.crop }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MapSlot {
    Diffuse,
    Normal,
    Height,
}

fn texture_at(visual: &mut TileVisual, slot: MapSlot) -> Option<&mut TextureRef> {
    match slot {
        MapSlot::Diffuse => Some(&mut visual.diffuse),
        MapSlot::Normal => visual.normal.as_mut(),
        MapSlot::Height => visual.height.as_mut(),
    }
}

struct SourceGroup {
    key: SourceKey,
    members: Vec<(usize, MapSlot)>,
}

/// Distinct sources across all records, in first-seen order
/// (record by record, diffuse then normal then height).
fn group_sources(records: &[TileVisual]) -> Vec<SourceGroup> {
    let mut groups: Vec<SourceGroup> = Vec::new();
    let mut index: HashMap<SourceKey, usize> = HashMap::new();
    for (i, visual) in records.iter().enumerate() {
        let slots = [
            (MapSlot::Diffuse, Some(&visual.diffuse)),
            (MapSlot::Normal, visual.normal.as_ref()),
            (MapSlot::Height, visual.height.as_ref()),
        ];
        for (slot, texture) in slots {
            let Some(texture) = texture else { continue };
            let key = SourceKey::of(texture);
            let g = *index.entry(key.clone()).or_insert_with(|| {
                groups.push(SourceGroup { key, members: Vec::new() });
                groups.len() - 1
            });
            groups[g].members.push((i, slot));
        }
    }
    groups
}

// ── TexturePacker ────────────────────────────────────────────────────────────

/// Result of a finished packing pass.
#[derive(Debug)]
pub struct PackedAtlas {
    pub name: String,
    pub image: RgbaImage,
    /// Where each distinct source landed, in placement order.
    pub regions: Vec<(SourceKey, UvRect)>,
    /// The input records with every texture redirected into the atlas.
    pub records: Vec<TileVisual>,
}

#[derive(Debug)]
pub enum PackStatus {
    Pending,
    Done(PackedAtlas),
}

/// Incremental atlas builder.
///
/// Sources are fetched through the texture cache strictly one at a time: the
/// next request is issued only after the previous image has been drawn, so
/// placement order is the first-seen order of the records no matter how
/// loads are scheduled.
pub struct TexturePacker {
    name: String,
    footprint: u32,
    records: Vec<TileVisual>,
    groups: Vec<SourceGroup>,
    offsets: Vec<[u32; 2]>,
    max_size: u32,
    extent: (u32, u32),
    canvas: RgbaImage,
    regions: Vec<(SourceKey, UvRect)>,
    next: usize,
    in_flight: Option<ImageHandle>,
}

impl TexturePacker {
    pub fn new(name: &str, records: Vec<TileVisual>, footprint: u32) -> Self {
        let groups = group_sources(&records);
        Self {
            name: name.to_string(),
            footprint,
            records,
            groups,
            offsets: Vec::new(),
            max_size: MAX_ATLAS_SIZE,
            extent: (1, 1),
            canvas: RgbaImage::new(0, 0),
            regions: Vec::new(),
            next: 0,
            in_flight: None,
        }
        .laid_out()
    }

    /// Cap both atlas sides at `max_size` pixels instead of [`MAX_ATLAS_SIZE`].
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self.laid_out()
    }

    fn laid_out(mut self) -> Self {
        let (offsets, width, height) = strip_layout(self.groups.len(), self.footprint, self.max_size);
        log::debug!(
            "atlas '{}': {} records, {} distinct sources, {width}x{height}",
            self.name,
            self.records.len(),
            self.groups.len()
        );
        self.offsets = offsets;
        self.extent = (width, height);
        // Oversized layouts are reported by `poll`; skip the allocation.
        self.canvas = if width <= self.max_size && height <= self.max_size {
            RgbaImage::new(width, height)
        } else {
            RgbaImage::new(0, 0)
        };
        self
    }

    fn check_size(&self) -> Result<(), ResourceError> {
        let (width, height) = self.extent;
        if width > self.max_size || height > self.max_size {
            return Err(ResourceError::AtlasTooLarge {
                name: self.name.clone(),
                width,
                height,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sources drawn so far.
    pub fn progress(&self) -> (usize, usize) {
        (self.next, self.groups.len())
    }

    /// Advance as far as loaded sources allow. `Done` is returned once; the
    /// packer is spent afterwards.
    pub fn poll(&mut self, cache: &mut TextureCache) -> Result<PackStatus, ResourceError> {
        if let Err(err) = self.check_size() {
            log::error!("{err}");
            return Err(err);
        }
        while self.next < self.groups.len() {
            let handle = match &self.in_flight {
                Some(h) => h.clone(),
                None => {
                    let h = cache.request(&self.groups[self.next].key.uri);
                    self.in_flight = Some(h.clone());
                    h
                }
            };
            if handle.is_pending() {
                return Ok(PackStatus::Pending);
            }
            if let Some(err) = handle.error() {
                log::error!("atlas '{}': {err}", self.name);
                return Err(err);
            }
            let Some(image) = handle.get() else { return Ok(PackStatus::Pending) };
            self.draw_next(&image);
            self.in_flight = None;
        }

        log::info!("atlas '{}' packed {} sources", self.name, self.groups.len());
        Ok(PackStatus::Done(PackedAtlas {
            name: self.name.clone(),
            image: std::mem::take(&mut self.canvas),
            regions: std::mem::take(&mut self.regions),
            records: std::mem::take(&mut self.records),
        }))
    }

    /// Pump the cache until the atlas is finished or fails.
    pub fn run_to_completion(mut self, cache: &mut TextureCache) -> Result<PackedAtlas, ResourceError> {
        loop {
            match self.poll(cache)? {
                PackStatus::Done(atlas) => return Ok(atlas),
                PackStatus::Pending => {
                    if cache.pump() == 0 {
                        let uri = self.groups.get(self.next).map(|g| g.key.uri.clone()).unwrap_or_default();
                        return Err(ResourceError::MissingTextureDependency { uri });
                    }
                }
            }
        }
    }

    fn draw_next(&mut self, source: &Arc<RgbaImage>) {
        let group = &self.groups[self.next];
        let [x, y] = self.offsets[self.next];
        let fp = self.footprint;

        let tile = match group.key.crop {
            Some([cx, cy]) => imageops::crop_imm(&**source, cx, cy, fp, fp).to_image(),
            None if source.dimensions() == (fp, fp) => (**source).clone(),
            None => imageops::resize(&**source, fp, fp, FilterType::Nearest),
        };
        imageops::replace(&mut self.canvas, &tile, x as i64, y as i64);

        let uv = UvRect::from_pixels(x, y, fp, fp, self.canvas.width(), self.canvas.height());
        for &(record, slot) in &group.members {
            if let Some(texture) = texture_at(&mut self.records[record], slot) {
                texture.name = self.name.clone();
                texture.uv = uv;
            }
        }
        self.regions.push((group.key.clone(), uv));
        self.next += 1;
    }
}
