use crate::lighting::light::{LightKind, LightRecord};
use crate::renderer::TextureId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId {
    index: u32,
    generation: u32,
}

impl MaterialId {
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Compiled shader programs the renderers know about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    /// Instanced tile shader with per-pixel lighting.
    Tile,
    /// Flat textured quads; ignores lights.
    Unlit,
}

impl ShaderProgram {
    pub fn is_lit(self) -> bool {
        matches!(self, ShaderProgram::Tile)
    }
}

/// One light-uniform array: fixed capacity, indexed by slot.
#[derive(Clone, Debug, PartialEq)]
pub struct LightArray {
    kind: LightKind,
    capacity: u32,
    records: Vec<Option<LightRecord>>,
}

impl LightArray {
    pub fn new(kind: LightKind, capacity: u32) -> Self {
        Self { kind, capacity, records: Vec::new() }
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// Per-record field names the shader expects.
    pub fn fields(&self) -> &'static [&'static str] {
        self.kind.fields()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Replace whatever occupies `slot`. Returns `false` when the slot is
    /// beyond capacity and nothing was written.
    pub fn write(&mut self, slot: u32, record: LightRecord) -> bool {
        if slot >= self.capacity {
            return false;
        }
        let idx = slot as usize;
        if idx >= self.records.len() {
            self.records.resize(idx + 1, None);
        }
        self.records[idx] = Some(record);
        true
    }

    /// Empty `slot`. Returns whether anything was there.
    pub fn clear(&mut self, slot: u32) -> bool {
        self.records.get_mut(slot as usize).is_some_and(|r| r.take().is_some())
    }

    pub fn get(&self, slot: u32) -> Option<&LightRecord> {
        self.records.get(slot as usize).and_then(|r| r.as_ref())
    }

    /// Highest written slot + 1.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = (u32, &LightRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (i as u32, r)))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Uniforms {
    directional: Option<LightArray>,
    point: Option<LightArray>,
    spot: Option<LightArray>,
}

impl Uniforms {
    pub fn light_array(&self, kind: LightKind) -> Option<&LightArray> {
        match kind {
            LightKind::Directional => self.directional.as_ref(),
            LightKind::Point => self.point.as_ref(),
            LightKind::Spot => self.spot.as_ref(),
        }
    }

    pub fn light_array_mut(&mut self, kind: LightKind) -> Option<&mut LightArray> {
        match kind {
            LightKind::Directional => self.directional.as_mut(),
            LightKind::Point => self.point.as_mut(),
            LightKind::Spot => self.spot.as_mut(),
        }
    }

    /// The array for `kind`, created empty on first use.
    pub fn light_array_or_init(&mut self, kind: LightKind, capacity: u32) -> &mut LightArray {
        let slot = match kind {
            LightKind::Directional => &mut self.directional,
            LightKind::Point => &mut self.point,
            LightKind::Spot => &mut self.spot,
        };
        slot.get_or_insert_with(|| LightArray::new(kind, capacity))
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub program: ShaderProgram,
    pub texture: Option<TextureId>,
    pub uniforms: Uniforms,
    revision: u64,
}

impl Material {
    pub fn new(program: ShaderProgram, texture: Option<TextureId>) -> Self {
        Self { program, texture, uniforms: Uniforms::default(), revision: 0 }
    }

    /// Bumped whenever uniforms change; renderers compare it to decide
    /// whether to re-upload.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Slab of materials addressed by generational [`MaterialId`]s.
#[derive(Default)]
pub struct MaterialStore {
    slots: Vec<(u32, Option<Material>)>,
    free: Vec<u32>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, material: Material) -> MaterialId {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.slots[index as usize];
            entry.1 = Some(material);
            MaterialId { index, generation: entry.0 }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push((0, Some(material)));
            MaterialId { index, generation: 0 }
        }
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        match self.slots.get(id.index as usize) {
            Some((generation, Some(m))) if *generation == id.generation => Some(m),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        match self.slots.get_mut(id.index as usize) {
            Some((generation, Some(m))) if *generation == id.generation => Some(m),
            _ => None,
        }
    }

    pub fn release(&mut self, id: MaterialId) -> Option<Material> {
        let entry = self.slots.get_mut(id.index as usize)?;
        if entry.0 != id.generation || entry.1.is_none() {
            return None;
        }
        entry.0 += 1;
        self.free.push(id.index);
        entry.1.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.slots.iter().enumerate().filter_map(|(i, (generation, m))| {
            m.as_ref().map(|m| (MaterialId { index: i as u32, generation: *generation }, m))
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|(_, m)| m.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
