// =============================================================================
// LIGHTING — per-kind light registries
//
// One `LightRegistry` runs for each `LightKind`. It tracks two lists:
//   consumers  entities with a `ShaderComponent` (materials that receive
//              light arrays)
//   sources    entities with a `LightComponent` of the registry's kind
//
// Every source owns a slot index for the lifetime of the light. Slots come
// from a monotonic counter and are never handed out twice, so a shader can
// address "light #2" across frames while other lights change.
// =============================================================================

pub mod light;
pub mod shading;

use crate::completion::Completion;
use crate::ecs::components::ShaderComponent;
use crate::ecs::schedule::{Context, EntityObserver, Filterable, FrameAdvance, System};
use crate::ecs::{ComponentKind, Entity, Filter, World};
use crate::error::EngineResult;

use light::{DirtyPolicy, LightComponent, LightKind, LightRecord};

pub struct LightRegistry {
    kind: LightKind,
    capacity: u32,
    policy: DirtyPolicy,
    consumers: Vec<Entity>,
    /// Consumers that have not yet received a full sync.
    fresh: Vec<Entity>,
    sources: Vec<Entity>,
    next_slot: u32,
    passes: u64,
}

impl LightRegistry {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            capacity: crate::renderer::max_lights(kind),
            policy: DirtyPolicy::default_for(kind),
            consumers: Vec::new(),
            fresh: Vec::new(),
            sources: Vec::new(),
            next_slot: 0,
            passes: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_policy(mut self, policy: DirtyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn policy(&self) -> DirtyPolicy {
        self.policy
    }

    pub fn consumers(&self) -> &[Entity] {
        &self.consumers
    }

    pub fn sources(&self) -> &[Entity] {
        &self.sources
    }

    /// Frames on which propagation actually ran (i.e. did not short-circuit).
    pub fn propagation_passes(&self) -> u64 {
        self.passes
    }

    fn register_source(&mut self, entity: Entity, light: &mut LightComponent) {
        let slot = match light.slot() {
            Some(slot) if slot < self.capacity => slot,
            requested => {
                if let Some(slot) = requested {
                    log::warn!(
                        "{:?} light {:?} asked for slot {slot}, beyond shader capacity {}; assigning the next free slot",
                        self.kind, entity, self.capacity
                    );
                }
                let slot = self.next_slot;
                light.assign_slot(slot);
                slot
            }
        };
        self.next_slot = self.next_slot.max(slot.saturating_add(1));
        if slot >= self.capacity {
            log::warn!(
                "{:?} light {:?} got slot {slot}, beyond shader capacity {}; it will not be drawn",
                self.kind, entity, self.capacity
            );
        } else {
            log::debug!("{:?} light {:?} -> slot {slot}", self.kind, entity);
        }
        light.mark_dirty();
        self.sources.push(entity);
    }

    /// Empty a removed light's slot in every consumer. The slot itself stays
    /// retired.
    fn retire_slot(&self, slot: u32, world: &World, ctx: &mut Context) {
        for consumer in &self.consumers {
            let Some(shader) = world.get::<ShaderComponent>(*consumer) else { continue };
            let Some(material) = ctx.res.materials.get_mut(shader.material) else { continue };
            let cleared = material.uniforms.light_array_mut(self.kind).is_some_and(|a| a.clear(slot));
            if cleared {
                material.touch();
            }
        }
        log::debug!("{:?} slot {slot} retired", self.kind);
    }

    fn records(&self, world: &World, dirty_only: bool) -> Vec<(u32, LightRecord)> {
        self.sources
            .iter()
            .filter_map(|e| world.get::<LightComponent>(*e))
            .filter(|l| l.kind() == self.kind && (!dirty_only || l.is_dirty()))
            .filter_map(|l| l.slot().map(|s| (s, l.record())))
            .collect()
    }
}

impl Filterable for LightRegistry {
    fn filter(&self) -> Filter {
        Filter::require_any(&[ComponentKind::Shader, ComponentKind::Light])
    }

    fn accepts(&self, entity: Entity, world: &World) -> bool {
        if world.has::<ShaderComponent>(entity) {
            return true;
        }
        world
            .get::<LightComponent>(entity)
            .is_some_and(|l| l.kind() == self.kind)
    }
}

impl EntityObserver for LightRegistry {
    fn on_add(&mut self, entity: Entity, world: &mut World, _ctx: &mut Context) -> Completion {
        if world.has::<ShaderComponent>(entity) {
            self.consumers.push(entity);
            self.fresh.push(entity);
        } else if let Some(light) = world.get_mut::<LightComponent>(entity) {
            self.register_source(entity, light);
        }
        Completion::done()
    }

    fn on_remove(&mut self, entity: Entity, world: &mut World, ctx: &mut Context) {
        if let Some(i) = self.consumers.iter().position(|e| *e == entity) {
            self.consumers.remove(i);
            self.fresh.retain(|e| *e != entity);
        } else if let Some(i) = self.sources.iter().position(|e| *e == entity) {
            self.sources.remove(i);
            if let Some(slot) = world.get::<LightComponent>(entity).and_then(|l| l.slot()) {
                self.retire_slot(slot, world, ctx);
            }
        }
    }
}

impl FrameAdvance for LightRegistry {
    fn advance(&mut self, _dt: f32, world: &mut World, ctx: &mut Context) -> EngineResult<()> {
        let dirty = self.records(world, true);
        if dirty.is_empty() && self.fresh.is_empty() {
            return Ok(());
        }
        self.passes += 1;

        let full = if self.fresh.is_empty() { Vec::new() } else { self.records(world, false) };

        for consumer in &self.consumers {
            let Some(shader) = world.get::<ShaderComponent>(*consumer) else { continue };
            let Some(material) = ctx.res.materials.get_mut(shader.material) else { continue };
            if !material.program.is_lit() {
                continue;
            }
            let records = if self.fresh.contains(consumer) { &full } else { &dirty };
            if records.is_empty() {
                continue;
            }
            let array = material.uniforms.light_array_or_init(self.kind, self.capacity);
            for (slot, record) in records {
                array.write(*slot, *record);
            }
            material.touch();
        }
        self.fresh.clear();

        let keep_dirty = self.policy == DirtyPolicy::Persist;
        for source in &self.sources {
            if let Some(light) = world.get_mut::<LightComponent>(*source) {
                if light.is_dirty() {
                    light.set_dirty(keep_dirty);
                }
            }
        }
        Ok(())
    }
}

impl System for LightRegistry {
    fn name(&self) -> &'static str {
        match self.kind {
            LightKind::Directional => "directional_lights",
            LightKind::Point => "point_lights",
            LightKind::Spot => "spot_lights",
        }
    }
}
