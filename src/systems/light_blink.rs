use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::completion::Completion;
use crate::config::BlinkConfig;
use crate::ecs::schedule::{Context, EntityObserver, Filterable, FrameAdvance, System};
use crate::ecs::{ComponentKind, Entity, Filter, World};
use crate::error::EngineResult;
use crate::lighting::light::{LightComponent, LightKind};

/// Flickers every light of one kind by flipping its `off` flag.
pub struct LightBlinkSystem {
    kind: LightKind,
    config: BlinkConfig,
    accumulator: f32,
    lights: Vec<Entity>,
    rng: StdRng,
}

impl LightBlinkSystem {
    pub fn new(kind: LightKind, config: BlinkConfig) -> Self {
        Self { kind, config, accumulator: 0.0, lights: Vec::new(), rng: StdRng::from_os_rng() }
    }

    /// Deterministic random mode.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        self.accumulator = 0.0;
    }

    pub fn set_random(&mut self, random: bool) {
        self.config.random = random;
    }
}

impl Filterable for LightBlinkSystem {
    fn filter(&self) -> Filter {
        Filter::require_all(&[ComponentKind::Light]).reject_any(&[ComponentKind::Sun])
    }

    fn accepts(&self, entity: Entity, world: &World) -> bool {
        world.get::<LightComponent>(entity).is_some_and(|l| l.kind() == self.kind)
    }
}

impl EntityObserver for LightBlinkSystem {
    fn on_add(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) -> Completion {
        self.lights.push(entity);
        Completion::done()
    }

    fn on_remove(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) {
        self.lights.retain(|e| *e != entity);
    }
}

impl FrameAdvance for LightBlinkSystem {
    fn advance(&mut self, dt: f32, world: &mut World, _ctx: &mut Context) -> EngineResult<()> {
        if !self.config.enabled || self.config.interval <= 0.0 {
            return Ok(());
        }
        self.accumulator += dt;
        let ticks = (self.accumulator / self.config.interval).floor();
        if ticks < 1.0 {
            return Ok(());
        }
        self.accumulator -= ticks * self.config.interval;

        // An even number of alternating flips lands where it started.
        let flip = ticks as u64 % 2 == 1;
        for entity in &self.lights {
            let Some(light) = world.get_mut::<LightComponent>(*entity) else { continue };
            if self.config.random {
                light.set_off(self.rng.random_bool(0.5));
            } else if flip {
                light.set_off(!light.is_off());
            }
        }
        Ok(())
    }
}

impl System for LightBlinkSystem {
    fn name(&self) -> &'static str {
        match self.kind {
            LightKind::Directional => "directional_blink",
            LightKind::Point => "point_blink",
            LightKind::Spot => "spot_blink",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityDesc;
    use crate::renderer::headless::HeadlessRenderer;
    use crate::resources::Resources;
    use glam::Vec3;

    fn enabled(random: bool) -> BlinkConfig {
        BlinkConfig { enabled: true, interval: 0.05, random }
    }

    #[test]
    fn alternates_on_each_interval() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };
        let mut sys = LightBlinkSystem::new(LightKind::Point, enabled(false));

        let e = world.spawn_desc(EntityDesc::light(LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.0, 0.0)));
        sys.on_add(e, &mut world, &mut ctx);

        sys.advance(0.06, &mut world, &mut ctx).unwrap();
        assert!(world.get::<LightComponent>(e).unwrap().is_off());
        sys.advance(0.02, &mut world, &mut ctx).unwrap();
        assert!(world.get::<LightComponent>(e).unwrap().is_off());
        sys.advance(0.03, &mut world, &mut ctx).unwrap();
        assert!(!world.get::<LightComponent>(e).unwrap().is_off());
    }

    #[test]
    fn disabled_blink_does_nothing() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };
        let mut sys = LightBlinkSystem::new(LightKind::Point, BlinkConfig::default());

        let e = world.spawn_desc(EntityDesc::light(LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.0, 0.0)));
        sys.on_add(e, &mut world, &mut ctx);
        sys.advance(1.0, &mut world, &mut ctx).unwrap();
        assert!(!world.get::<LightComponent>(e).unwrap().is_off());
    }

    #[test]
    fn seeded_random_mode_is_reproducible() {
        let run = || {
            let mut world = World::new();
            let mut res = Resources::default();
            let mut renderer = HeadlessRenderer::new();
            let mut ctx = Context { res: &mut res, renderer: &mut renderer };
            let mut sys = LightBlinkSystem::new(LightKind::Spot, enabled(true)).with_seed(7);
            let spot = LightComponent::spot(Vec3::ZERO, Vec3::X, 0.4, Vec3::ONE, 0.0, 0.0);
            let e = world.spawn_desc(EntityDesc::light(spot));
            sys.on_add(e, &mut world, &mut ctx);
            (0..16)
                .map(|_| {
                    sys.advance(0.05, &mut world, &mut ctx).unwrap();
                    world.get::<LightComponent>(e).unwrap().is_off()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
