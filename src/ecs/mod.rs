pub mod components;
pub mod schedule;

use components::{LightComponent, ShaderComponent, SunComponent, TileTransform, TileVisual};

// ---------------------------------------------------------------------------
// Entity — generational index
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entity {
    id: u32,
    generation: u32,
}

impl Entity {
    pub fn id(self) -> u32 {
        self.id
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// SparseSet<T> — per-component storage
// ---------------------------------------------------------------------------

pub struct SparseSet<T> {
    sparse: Vec<u32>,
    dense: Vec<u32>,
    data: Vec<T>,
}

const EMPTY: u32 = u32::MAX;

impl<T> SparseSet<T> {
    fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    fn contains(&self, id: u32) -> bool {
        let idx = id as usize;
        idx < self.sparse.len() && self.sparse[idx] != EMPTY
    }

    fn insert(&mut self, id: u32, value: T) {
        let idx = id as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, EMPTY);
        }
        if self.sparse[idx] != EMPTY {
            let dense_idx = self.sparse[idx] as usize;
            self.data[dense_idx] = value;
        } else {
            self.sparse[idx] = self.dense.len() as u32;
            self.dense.push(id);
            self.data.push(value);
        }
    }

    fn remove(&mut self, id: u32) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let idx = id as usize;
        let dense_idx = self.sparse[idx] as usize;
        self.sparse[idx] = EMPTY;

        // Swap-remove keeps the dense arrays packed.
        let last = self.dense.len() - 1;
        if dense_idx != last {
            let moved_id = self.dense[last] as usize;
            self.sparse[moved_id] = dense_idx as u32;
        }
        self.dense.swap_remove(dense_idx);
        Some(self.data.swap_remove(dense_idx))
    }

    fn get(&self, id: u32) -> Option<&T> {
        if !self.contains(id) {
            return None;
        }
        Some(&self.data[self.sparse[id as usize] as usize])
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        if !self.contains(id) {
            return None;
        }
        Some(&mut self.data[self.sparse[id as usize] as usize])
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Component kinds and filters
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    TileTransform,
    TileVisual,
    Light,
    Shader,
    Sun,
}

impl ComponentKind {
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Bitmask over [`ComponentKind`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentSet(u8);

impl ComponentSet {
    pub const EMPTY: Self = Self(0);

    pub const fn of(kinds: &[ComponentKind]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub fn with(self, kind: ComponentKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn contains(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Declarative entity predicate: every kind in `all`, at least one of `any`
/// (when non-empty), none of `none`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    pub all: ComponentSet,
    pub any: ComponentSet,
    pub none: ComponentSet,
}

impl Filter {
    pub const fn require_all(kinds: &[ComponentKind]) -> Self {
        Self { all: ComponentSet::of(kinds), any: ComponentSet::EMPTY, none: ComponentSet::EMPTY }
    }

    pub const fn require_any(kinds: &[ComponentKind]) -> Self {
        Self { all: ComponentSet::EMPTY, any: ComponentSet::of(kinds), none: ComponentSet::EMPTY }
    }

    pub const fn reject_any(mut self, kinds: &[ComponentKind]) -> Self {
        self.none = ComponentSet::of(kinds);
        self
    }

    pub fn matches(&self, present: ComponentSet) -> bool {
        present.contains_all(self.all)
            && (self.any.is_empty() || present.intersects(self.any))
            && !present.intersects(self.none)
    }
}

// ---------------------------------------------------------------------------
// Component — static dispatch to the world's typed slot for each kind
// ---------------------------------------------------------------------------

pub trait Component: Sized + 'static {
    const KIND: ComponentKind;
    fn storage(slots: &Slots) -> &SparseSet<Self>;
    fn storage_mut(slots: &mut Slots) -> &mut SparseSet<Self>;
}

/// One sparse set per component kind.
pub struct Slots {
    tile_transforms: SparseSet<TileTransform>,
    tile_visuals: SparseSet<TileVisual>,
    lights: SparseSet<LightComponent>,
    shaders: SparseSet<ShaderComponent>,
    suns: SparseSet<SunComponent>,
}

impl Slots {
    fn new() -> Self {
        Self {
            tile_transforms: SparseSet::new(),
            tile_visuals: SparseSet::new(),
            lights: SparseSet::new(),
            shaders: SparseSet::new(),
            suns: SparseSet::new(),
        }
    }

    fn remove_all(&mut self, id: u32) {
        self.tile_transforms.remove(id);
        self.tile_visuals.remove(id);
        self.lights.remove(id);
        self.shaders.remove(id);
        self.suns.remove(id);
    }

    fn kinds(&self, id: u32) -> ComponentSet {
        let present = [
            (ComponentKind::TileTransform, self.tile_transforms.contains(id)),
            (ComponentKind::TileVisual, self.tile_visuals.contains(id)),
            (ComponentKind::Light, self.lights.contains(id)),
            (ComponentKind::Shader, self.shaders.contains(id)),
            (ComponentKind::Sun, self.suns.contains(id)),
        ];
        present
            .iter()
            .filter(|(_, has)| *has)
            .fold(ComponentSet::EMPTY, |set, (kind, _)| set.with(*kind))
    }
}

macro_rules! component_slot {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;
            fn storage(slots: &Slots) -> &SparseSet<Self> {
                &slots.$field
            }
            fn storage_mut(slots: &mut Slots) -> &mut SparseSet<Self> {
                &mut slots.$field
            }
        }
    };
}

component_slot!(TileTransform, TileTransform, tile_transforms);
component_slot!(TileVisual, TileVisual, tile_visuals);
component_slot!(LightComponent, Light, lights);
component_slot!(ShaderComponent, Shader, shaders);
component_slot!(SunComponent, Sun, suns);

/// Optional component slots for spawning an entity in one call.
#[derive(Clone, Debug, Default)]
pub struct EntityDesc {
    pub tile_transform: Option<TileTransform>,
    pub tile_visual: Option<TileVisual>,
    pub light: Option<LightComponent>,
    pub shader: Option<ShaderComponent>,
    pub sun: Option<SunComponent>,
}

impl EntityDesc {
    pub fn tile(transform: TileTransform, visual: TileVisual) -> Self {
        Self { tile_transform: Some(transform), tile_visual: Some(visual), ..Default::default() }
    }

    pub fn light(light: LightComponent) -> Self {
        Self { light: Some(light), ..Default::default() }
    }

    pub fn shader(shader: ShaderComponent) -> Self {
        Self { shader: Some(shader), ..Default::default() }
    }

    pub fn with_sun(mut self, sun: SunComponent) -> Self {
        self.sun = Some(sun);
        self
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

struct EntityAllocator {
    generations: Vec<u32>,
    live: Vec<bool>,
    free: Vec<u32>,
    next_id: u32,
}

impl EntityAllocator {
    fn new() -> Self {
        Self {
            generations: Vec::new(),
            live: Vec::new(),
            free: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate(&mut self) -> Entity {
        if let Some(id) = self.free.pop() {
            self.live[id as usize] = true;
            Entity {
                id,
                generation: self.generations[id as usize],
            }
        } else {
            let id = self.next_id;
            self.next_id += 1;
            self.generations.push(0);
            self.live.push(true);
            Entity { id, generation: 0 }
        }
    }

    fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.generations[entity.id as usize] += 1;
        self.live[entity.id as usize] = false;
        self.free.push(entity.id);
        true
    }

    fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.id as usize;
        idx < self.generations.len()
            && self.live[idx]
            && self.generations[idx] == entity.generation
    }

    fn entity_at(&self, id: u32) -> Entity {
        Entity { id, generation: self.generations[id as usize] }
    }
}

// ---------------------------------------------------------------------------
// World — entity store with one typed slot per component kind
// ---------------------------------------------------------------------------

/// Entity store.
///
/// Components live in a fixed set of typed sparse sets; which systems see an
/// entity is decided by the set of kinds it carries, never by probing.
/// Structural changes made while systems run are queued and dispatched by
/// [`schedule::Schedule::flush`].
pub struct World {
    allocator: EntityAllocator,
    slots: Slots,
    spawned: Vec<Entity>,
    doomed: Vec<Entity>,
}

impl World {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            slots: Slots::new(),
            spawned: Vec::new(),
            doomed: Vec::new(),
        }
    }

    // -- Entity lifecycle ---------------------------------------------------

    pub fn spawn(&mut self) -> Entity {
        self.allocator.allocate()
    }

    /// Spawn with components in place. Systems are not notified.
    pub fn spawn_desc(&mut self, desc: EntityDesc) -> Entity {
        let entity = self.spawn();
        if let Some(c) = desc.tile_transform {
            self.insert(entity, c);
        }
        if let Some(c) = desc.tile_visual {
            self.insert(entity, c);
        }
        if let Some(c) = desc.light {
            self.insert(entity, c);
        }
        if let Some(c) = desc.shader {
            self.insert(entity, c);
        }
        if let Some(c) = desc.sun {
            self.insert(entity, c);
        }
        entity
    }

    /// Spawn now and queue an `on_add` notification for the next flush.
    pub fn spawn_deferred(&mut self, desc: EntityDesc) -> Entity {
        let entity = self.spawn_desc(desc);
        self.spawned.push(entity);
        entity
    }

    /// Queue removal: systems get `on_remove` at the next flush, then the
    /// entity is despawned.
    pub fn queue_despawn(&mut self, entity: Entity) {
        if self.is_alive(entity) && !self.doomed.contains(&entity) {
            self.doomed.push(entity);
        }
    }

    pub(crate) fn take_spawned(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.spawned)
    }

    pub(crate) fn take_doomed(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.doomed)
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.allocator.deallocate(entity) {
            return false;
        }
        self.slots.remove_all(entity.id);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    // -- Components ---------------------------------------------------------

    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) {
        assert!(
            self.is_alive(entity),
            "cannot insert component on dead entity"
        );
        T::storage_mut(&mut self.slots).insert(entity.id, component);
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        T::storage_mut(&mut self.slots).remove(entity.id)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        T::storage(&self.slots).get(entity.id)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        T::storage_mut(&mut self.slots).get_mut(entity.id)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity) && T::storage(&self.slots).contains(entity.id)
    }

    /// The set of component kinds `entity` carries.
    pub fn kinds(&self, entity: Entity) -> ComponentSet {
        if !self.is_alive(entity) {
            return ComponentSet::EMPTY;
        }
        self.slots.kinds(entity.id)
    }

    /// All live entities, in id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.allocator.next_id)
            .filter(|&id| self.allocator.live[id as usize])
            .map(|id| self.allocator.entity_at(id))
    }

    pub fn len(&self) -> usize {
        self.entities().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Queries ------------------------------------------------------------

    pub fn query<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let set = T::storage(&self.slots);
        set.dense
            .iter()
            .zip(set.data.iter())
            .map(|(&id, c)| (self.allocator.entity_at(id), c))
    }

    pub fn query_mut<T: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        // Split borrow: generations are read while the slot is borrowed mutably.
        let allocator = &self.allocator;
        let set = T::storage_mut(&mut self.slots);
        set.dense
            .iter()
            .zip(set.data.iter_mut())
            .map(move |(&id, c)| (allocator.entity_at(id), c))
    }

    /// Live entities matching `filter`, in id order.
    pub fn filtered(&self, filter: &Filter) -> Vec<Entity> {
        self.entities()
            .filter(|e| filter.matches(self.kinds(*e)))
            .collect()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{LightKind, TextureRef};
    use glam::Vec3;

    fn grass() -> TileVisual {
        TileVisual::new(TextureRef::new("grass.png"))
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut world = World::new();
        let old = world.spawn();
        world.insert(old, TileTransform::new(1, 2));
        world.despawn(old);

        let new = world.spawn();
        assert_eq!(old.id(), new.id());
        assert_ne!(old.generation(), new.generation());
        assert!(!world.is_alive(old));
        assert!(world.get::<TileTransform>(old).is_none());
    }

    #[test]
    fn despawn_clears_every_slot() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::tile(TileTransform::new(0, 0), grass()));
        world.despawn(e);
        let recycled = world.spawn();
        assert_eq!(world.kinds(recycled), ComponentSet::EMPTY);
    }

    #[test]
    fn kinds_reflect_present_components() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::tile(TileTransform::new(3, 4), grass()));
        let kinds = world.kinds(e);
        assert!(kinds.contains(ComponentKind::TileTransform));
        assert!(kinds.contains(ComponentKind::TileVisual));
        assert!(!kinds.contains(ComponentKind::Light));
    }

    #[test]
    fn filter_semantics() {
        let tile = ComponentSet::of(&[ComponentKind::TileTransform, ComponentKind::TileVisual]);
        let light = ComponentSet::of(&[ComponentKind::Light]);

        let tiles = Filter::require_all(&[ComponentKind::TileTransform, ComponentKind::TileVisual]);
        assert!(tiles.matches(tile));
        assert!(!tiles.matches(light));

        let lit = Filter::require_any(&[ComponentKind::Light, ComponentKind::Shader]);
        assert!(lit.matches(light));
        assert!(!lit.matches(tile));

        let no_sun = Filter::require_any(&[ComponentKind::Light]).reject_any(&[ComponentKind::Sun]);
        assert!(!no_sun.matches(light.with(ComponentKind::Sun)));
    }

    #[test]
    fn swap_remove_preserves_other_entries() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.insert(a, TileTransform::new(1, 0));
        world.insert(b, TileTransform::new(2, 0));
        world.insert(c, TileTransform::new(3, 0));

        world.remove::<TileTransform>(b);

        assert_eq!(world.get::<TileTransform>(a), Some(&TileTransform::new(1, 0)));
        assert!(world.get::<TileTransform>(b).is_none());
        assert_eq!(world.get::<TileTransform>(c), Some(&TileTransform::new(3, 0)));
        assert_eq!(world.query::<TileTransform>().count(), 2);
    }

    #[test]
    fn query_mut_reports_live_entities() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::light(LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.1, 0.01)));
        for (entity, light) in world.query_mut::<LightComponent>() {
            assert_eq!(entity, e);
            light.set_off(true);
        }
        let light = world.get::<LightComponent>(e).unwrap();
        assert!(light.is_off());
        assert_eq!(light.kind(), LightKind::Point);
    }

    #[test]
    fn deferred_structural_changes_are_queued() {
        let mut world = World::new();
        let e = world.spawn_deferred(EntityDesc::tile(TileTransform::new(0, 0), grass()));
        assert_eq!(world.take_spawned(), vec![e]);
        world.queue_despawn(e);
        world.queue_despawn(e);
        assert!(world.is_alive(e), "despawn waits for the flush");
        assert_eq!(world.take_doomed(), vec![e]);
    }

    #[test]
    fn entities_skips_freed_ids() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.despawn(a);
        assert_eq!(world.entities().collect::<Vec<_>>(), vec![b]);
        assert_eq!(world.len(), 1);
    }
}
