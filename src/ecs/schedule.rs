use std::any::Any;

use crate::completion::Completion;
use crate::error::EngineResult;
use crate::renderer::SceneRenderer;
use crate::resources::Resources;

use super::{Entity, Filter, World};

/// Upper bound on cascading deferred spawns handled by a single flush.
const MAX_FLUSH_ROUNDS: usize = 8;

// ── Context ─────────────────────────────────────────────────────────────────

/// Everything a system may touch besides the world: shared resources and the
/// scene renderer. Built fresh for each dispatch by the engine.
pub struct Context<'a> {
    pub res: &'a mut Resources,
    pub renderer: &'a mut dyn SceneRenderer,
}

// ── Capability traits ───────────────────────────────────────────────────────

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Declares which entities a system observes.
pub trait Filterable {
    fn filter(&self) -> Filter;

    /// Refinement over the component-kind predicate (e.g. a light registry
    /// only accepts lights of its own kind).
    fn accepts(&self, entity: Entity, world: &World) -> bool {
        self.filter().matches(world.kinds(entity))
    }
}

pub trait EntityObserver {
    /// Called once per accepted entity. The returned completion settles when
    /// whatever the system started for this entity has finished.
    fn on_add(&mut self, _entity: Entity, _world: &mut World, _ctx: &mut Context) -> Completion {
        Completion::done()
    }

    /// Called while the entity and its components are still alive.
    fn on_remove(&mut self, _entity: Entity, _world: &mut World, _ctx: &mut Context) {}
}

pub trait FrameAdvance {
    fn advance(&mut self, dt: f32, world: &mut World, ctx: &mut Context) -> EngineResult<()>;
}

pub trait System: AsAny + Filterable + EntityObserver + FrameAdvance + 'static {
    fn name(&self) -> &'static str;

    fn on_add_to_world(&mut self, _world: &mut World, _ctx: &mut Context) {}
}

// ── Schedule ────────────────────────────────────────────────────────────────

/// Ordered list of systems. Systems advance in insertion order and deferred
/// structural changes are flushed after each one.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<Box<dyn System>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system and replay every live entity it accepts.
    pub fn add_system(&mut self, mut system: Box<dyn System>, world: &mut World, ctx: &mut Context) {
        log::debug!("schedule: adding system '{}'", system.name());
        system.on_add_to_world(world, ctx);
        let existing: Vec<Entity> = world.entities().collect();
        for entity in existing {
            if system.accepts(entity, world) {
                system.on_add(entity, world, ctx);
            }
        }
        self.systems.push(system);
        flush_into(&mut self.systems, world, ctx);
    }

    /// Notify every accepting system of a new entity. The result joins the
    /// completions of all of them.
    pub fn add_entity(&mut self, entity: Entity, world: &mut World, ctx: &mut Context) -> Completion {
        let mut parts = Vec::new();
        for system in self.systems.iter_mut() {
            if system.accepts(entity, world) {
                parts.push(system.on_add(entity, world, ctx));
            }
        }
        flush_into(&mut self.systems, world, ctx);
        Completion::join(parts)
    }

    /// Notify observers, then despawn.
    pub fn remove_entity(&mut self, entity: Entity, world: &mut World, ctx: &mut Context) {
        if !world.is_alive(entity) {
            return;
        }
        world.queue_despawn(entity);
        flush_into(&mut self.systems, world, ctx);
    }

    pub fn advance(&mut self, dt: f32, world: &mut World, ctx: &mut Context) -> EngineResult<()> {
        for i in 0..self.systems.len() {
            self.systems[i].advance(dt, world, ctx)?;
            flush_into(&mut self.systems, world, ctx);
        }
        Ok(())
    }

    /// Dispatch queued removals and spawns.
    pub fn flush(&mut self, world: &mut World, ctx: &mut Context) {
        flush_into(&mut self.systems, world, ctx);
    }

    pub fn system<T: System>(&self) -> Option<&T> {
        self.systems.iter().find_map(|s| (**s).as_any().downcast_ref::<T>())
    }

    pub fn system_mut<T: System>(&mut self) -> Option<&mut T> {
        self.systems.iter_mut().find_map(|s| (**s).as_any_mut().downcast_mut::<T>())
    }

    /// Like [`Schedule::system`], for types scheduled more than once.
    pub fn find<T: System>(&self, name: &str) -> Option<&T> {
        self.systems
            .iter()
            .filter(|s| s.name() == name)
            .find_map(|s| (**s).as_any().downcast_ref::<T>())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

fn flush_into(systems: &mut [Box<dyn System>], world: &mut World, ctx: &mut Context) {
    for _ in 0..MAX_FLUSH_ROUNDS {
        let doomed = world.take_doomed();
        let spawned = world.take_spawned();
        if doomed.is_empty() && spawned.is_empty() {
            return;
        }

        for entity in doomed {
            for system in systems.iter_mut() {
                if system.accepts(entity, world) {
                    system.on_remove(entity, world, ctx);
                }
            }
            world.despawn(entity);
        }

        for entity in spawned {
            if !world.is_alive(entity) {
                continue;
            }
            for system in systems.iter_mut() {
                if system.accepts(entity, world) {
                    // Deferred spawns come from systems themselves; nobody
                    // waits on their completion.
                    let _ = system.on_add(entity, world, ctx);
                }
            }
        }
    }
    log::warn!("schedule: flush did not settle after {MAX_FLUSH_ROUNDS} rounds");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{TextureRef, TileTransform, TileVisual};
    use crate::ecs::{ComponentKind, EntityDesc};
    use crate::renderer::headless::HeadlessRenderer;

    #[derive(Default)]
    struct Recorder {
        added: Vec<Entity>,
        removed: Vec<Entity>,
        frames: u32,
    }

    impl Filterable for Recorder {
        fn filter(&self) -> Filter {
            Filter::require_all(&[ComponentKind::TileTransform])
        }
    }

    impl EntityObserver for Recorder {
        fn on_add(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) -> Completion {
            self.added.push(entity);
            Completion::done()
        }

        fn on_remove(&mut self, entity: Entity, world: &mut World, _ctx: &mut Context) {
            assert!(world.is_alive(entity));
            self.removed.push(entity);
        }
    }

    impl FrameAdvance for Recorder {
        fn advance(&mut self, _dt: f32, _world: &mut World, _ctx: &mut Context) -> EngineResult<()> {
            self.frames += 1;
            Ok(())
        }
    }

    impl System for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn tile(x: i32) -> EntityDesc {
        EntityDesc::tile(TileTransform::new(x, 0), TileVisual::new(TextureRef::new("t.png")))
    }

    #[test]
    fn adding_a_system_replays_existing_entities() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };

        let a = world.spawn_desc(tile(0));
        let _light_only = world.spawn();

        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(Recorder::default()), &mut world, &mut ctx);

        assert_eq!(schedule.system::<Recorder>().unwrap().added, vec![a]);
    }

    #[test]
    fn systems_are_found_by_type_and_name() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };
        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(Recorder::default()), &mut world, &mut ctx);

        assert!(schedule.find::<Recorder>("recorder").is_some());
        assert!(schedule.find::<Recorder>("other").is_none());
        schedule.system_mut::<Recorder>().unwrap().frames = 7;
        assert_eq!(schedule.system::<Recorder>().unwrap().frames, 7);
    }

    #[test]
    fn removal_notifies_before_despawn() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };

        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(Recorder::default()), &mut world, &mut ctx);

        let e = world.spawn_desc(tile(1));
        assert!(schedule.add_entity(e, &mut world, &mut ctx).is_done());
        schedule.remove_entity(e, &mut world, &mut ctx);

        assert!(!world.is_alive(e));
        assert_eq!(schedule.system::<Recorder>().unwrap().removed, vec![e]);
    }

    #[test]
    fn advance_runs_every_system() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };

        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(Recorder::default()), &mut world, &mut ctx);
        schedule.advance(0.016, &mut world, &mut ctx).unwrap();
        schedule.advance(0.016, &mut world, &mut ctx).unwrap();

        assert_eq!(schedule.system::<Recorder>().unwrap().frames, 2);
        assert_eq!(schedule.names(), vec!["recorder"]);
    }

    #[test]
    fn deferred_spawns_are_dispatched_on_flush() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };

        let mut schedule = Schedule::new();
        schedule.add_system(Box::new(Recorder::default()), &mut world, &mut ctx);

        let e = world.spawn_deferred(tile(2));
        assert!(schedule.system::<Recorder>().unwrap().added.is_empty());
        schedule.flush(&mut world, &mut ctx);
        assert_eq!(schedule.system::<Recorder>().unwrap().added, vec![e]);
    }
}
