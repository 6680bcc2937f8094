use std::f32::consts::PI;

use glam::Vec3;

use crate::completion::Completion;
use crate::config::TimeOfDayConfig;
use crate::ecs::components::SunComponent;
use crate::ecs::schedule::{Context, EntityObserver, Filterable, FrameAdvance, System};
use crate::ecs::{ComponentKind, Entity, EntityDesc, Filter, World};
use crate::error::EngineResult;
use crate::lighting::light::LightComponent;

/// Minutes in half a cycle; the sun direction's x term repeats at this period.
pub const HALF_CYCLE_MINUTES: f32 = 720.0;
/// Length of the clock before it wraps.
pub const CYCLE_MINUTES: f32 = 2.0 * HALF_CYCLE_MINUTES;

/// Direction of the sunlight at `minute`.
pub fn sun_direction(minute: f32, sun_y: f32) -> Vec3 {
    let x = (minute / HALF_CYCLE_MINUTES * PI).sin() * 0.8;
    let z = (minute / CYCLE_MINUTES * PI).sin() - 0.5;
    Vec3::new(x, sun_y, z)
}

/// Brightness factor for a position `v` in the normalized cycle.
///
/// A downward parabola through dawn and dusk, saturated to 1 above the
/// threshold.
pub fn daylight(v: f32, cfg: &TimeOfDayConfig) -> f32 {
    let dawn = cfg.dawn / CYCLE_MINUTES;
    let dusk = cfg.dusk / CYCLE_MINUTES;
    let light = -cfg.light_speed * (v - dawn) * (v - dusk);
    if cfg.light_threshold <= 0.0 {
        return if light > 0.0 { 1.0 } else { 0.0 };
    }
    if light > cfg.light_threshold {
        1.0
    } else {
        light / cfg.light_threshold
    }
}

/// Sun color at `minute`: black at night, white scaled by [`daylight`] in between.
pub fn sun_color(minute: f32, cfg: &TimeOfDayConfig) -> Vec3 {
    if minute <= cfg.dawn || minute >= cfg.dusk {
        return Vec3::ZERO;
    }
    Vec3::ONE * daylight(minute / CYCLE_MINUTES, cfg)
}

/// Owns the sun: a directional light whose direction and color follow a
/// looping clock.
pub struct TimeOfDaySystem {
    config: TimeOfDayConfig,
    minute: f32,
    accumulator: f32,
    /// Clock moved since the sun was last written.
    moved: bool,
    sun: Option<Entity>,
}

impl TimeOfDaySystem {
    pub fn new(config: TimeOfDayConfig) -> Self {
        let minute = config.start_minute.rem_euclid(CYCLE_MINUTES).floor();
        Self { config, minute, accumulator: 0.0, moved: false, sun: None }
    }

    pub fn config(&self) -> &TimeOfDayConfig {
        &self.config
    }

    pub fn minute(&self) -> f32 {
        self.minute
    }

    pub fn sun(&self) -> Option<Entity> {
        self.sun
    }

    pub fn is_paused(&self) -> bool {
        self.config.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.config.paused = paused;
        self.accumulator = 0.0;
    }

    pub fn toggle_paused(&mut self) {
        self.set_paused(!self.config.paused);
    }

    /// Jump the clock. The sun follows on the next advance.
    pub fn set_minute(&mut self, minute: f32) {
        self.minute = minute.rem_euclid(CYCLE_MINUTES).floor();
        self.accumulator = 0.0;
        self.moved = true;
    }

    /// Whole minutes elapsed during `dt` seconds, keeping the remainder.
    fn tick(&mut self, dt: f32) -> u32 {
        if self.config.paused || self.config.seconds_per_minute <= 0.0 {
            return 0;
        }
        self.accumulator += dt;
        let minutes = (self.accumulator / self.config.seconds_per_minute).floor();
        if minutes < 1.0 {
            return 0;
        }
        self.accumulator -= minutes * self.config.seconds_per_minute;
        minutes as u32
    }

    fn sun_light(&self) -> LightComponent {
        LightComponent::directional(
            sun_direction(self.minute, self.config.sun_y),
            sun_color(self.minute, &self.config),
        )
    }
}

impl Filterable for TimeOfDaySystem {
    fn filter(&self) -> Filter {
        Filter::require_all(&[ComponentKind::Sun, ComponentKind::Light])
    }
}

impl EntityObserver for TimeOfDaySystem {
    fn on_add(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) -> Completion {
        if self.sun.is_none() {
            self.sun = Some(entity);
        }
        Completion::done()
    }

    fn on_remove(&mut self, entity: Entity, _world: &mut World, _ctx: &mut Context) {
        if self.sun == Some(entity) {
            self.sun = None;
        }
    }
}

impl FrameAdvance for TimeOfDaySystem {
    fn advance(&mut self, dt: f32, world: &mut World, _ctx: &mut Context) -> EngineResult<()> {
        let minutes = self.tick(dt);
        if minutes > 0 {
            self.minute = (self.minute + minutes as f32) % CYCLE_MINUTES;
            self.moved = true;
        }
        if !self.moved {
            return Ok(());
        }
        let Some(sun) = self.sun else { return Ok(()) };

        let direction = sun_direction(self.minute, self.config.sun_y);
        let color = sun_color(self.minute, &self.config);
        if let Some(clock) = world.get_mut::<SunComponent>(sun) {
            clock.time_of_day = self.minute;
        }
        if let Some(light) = world.get_mut::<LightComponent>(sun) {
            light.set_direction(direction);
            light.set_color(color);
        }
        self.moved = false;
        Ok(())
    }
}

impl System for TimeOfDaySystem {
    fn name(&self) -> &'static str {
        "time_of_day"
    }

    fn on_add_to_world(&mut self, world: &mut World, _ctx: &mut Context) {
        if !self.config.enabled {
            return;
        }
        let sun = EntityDesc::light(self.sun_light()).with_sun(SunComponent { time_of_day: self.minute });
        let entity = world.spawn_deferred(sun);
        log::debug!("time of day: sun {entity:?} at minute {}", self.minute);
    }
}
