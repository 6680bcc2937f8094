use glam::Quat;

use crate::completion::Completion;
use crate::ecs::schedule::{Context, EntityObserver, Filterable, FrameAdvance, System};
use crate::ecs::{ComponentKind, Entity, Filter, World};
use crate::error::EngineResult;
use crate::lighting::light::{LightComponent, LightKind};

/// Sweeps every spotlight around the z axis in fixed steps.
pub struct SpotlightRotationSystem {
    step: f32,
    interval: f32,
    accumulator: f32,
    spots: Vec<Entity>,
}

impl SpotlightRotationSystem {
    /// Rotate by `step` radians every `interval` seconds.
    pub fn new(step: f32, interval: f32) -> Self {
        Self { step, interval, accumulator: 0.0, spots: Vec::new() }
    }

    pub fn spots(&self) -> &[Entity] {
        &self.spots
    }
}

impl Filterable for SpotlightRotationSystem {
    fn filter(&self) -> Filter {
        Filter::require_all(&[ComponentKind::Light])
    }

    fn accepts(&self, entity: Entity, world: &World) -> bool {
        world.get::<LightComponent>(entity).is_some_and(|l| l.kind() == LightKind::Spot)
    }
}

impl EntityObserver for SpotlightRotationSystem {
    fn on_add(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) -> Completion {
        self.spots.push(entity);
        Completion::done()
    }

    fn on_remove(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) {
        self.spots.retain(|e| *e != entity);
    }
}

impl FrameAdvance for SpotlightRotationSystem {
    fn advance(&mut self, dt: f32, world: &mut World, _ctx: &mut Context) -> EngineResult<()> {
        if self.interval <= 0.0 {
            return Ok(());
        }
        self.accumulator += dt;
        let steps = (self.accumulator / self.interval).floor();
        if steps < 1.0 {
            return Ok(());
        }
        self.accumulator -= steps * self.interval;

        let rotation = Quat::from_rotation_z(self.step * steps);
        for spot in &self.spots {
            if let Some(light) = world.get_mut::<LightComponent>(*spot) {
                let direction = rotation * light.direction();
                light.set_direction(direction);
            }
        }
        Ok(())
    }
}

impl System for SpotlightRotationSystem {
    fn name(&self) -> &'static str {
        "spotlight_rotation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityDesc;
    use crate::renderer::headless::HeadlessRenderer;
    use crate::resources::Resources;
    use glam::Vec3;

    #[test]
    fn rotates_once_per_interval() {
        let mut world = World::new();
        let mut res = Resources::default();
        let mut renderer = HeadlessRenderer::new();
        let mut ctx = Context { res: &mut res, renderer: &mut renderer };
        let mut sys = SpotlightRotationSystem::new(std::f32::consts::FRAC_PI_2, 0.1);

        let spot = LightComponent::spot(Vec3::ZERO, Vec3::X, 0.5, Vec3::ONE, 0.0, 0.0);
        let e = world.spawn_desc(EntityDesc::light(spot));
        assert!(sys.accepts(e, &world));
        sys.on_add(e, &mut world, &mut ctx);

        sys.advance(0.05, &mut world, &mut ctx).unwrap();
        assert!((world.get::<LightComponent>(e).unwrap().direction() - Vec3::X).length() < 1e-6);

        sys.advance(0.06, &mut world, &mut ctx).unwrap();
        let light = world.get::<LightComponent>(e).unwrap();
        assert!((light.direction() - Vec3::Y).length() < 1e-5);
        assert!(light.is_dirty());
    }

    #[test]
    fn ignores_point_lights() {
        let mut world = World::new();
        let sys = SpotlightRotationSystem::new(0.025, 1.0 / 30.0);
        let p = world.spawn_desc(EntityDesc::light(LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.0, 0.0)));
        assert!(!sys.accepts(p, &world));
    }
}
