use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::completion::{Completion, Handle};
use crate::config::EngineConfig;
use crate::ecs::schedule::{Context, Schedule};
use crate::ecs::{Entity, EntityDesc, World};
use crate::error::{EngineError, EngineResult};
use crate::input::{Action, ActionMap, InputState};
use crate::lighting::LightRegistry;
use crate::lighting::light::LightKind;
use crate::map::{self, MapLoad, MapReport};
use crate::renderer::{SceneRenderer, WgpuRenderer};
use crate::resources::Resources;
use crate::resources::texture_cache::{FileImageSource, ImageSource, TextureCache};
use crate::systems::{LightBlinkSystem, SpotlightRotationSystem, TimeOfDaySystem};
use crate::tiles::TileSystem;

/// Camera pan speed in screen pixels per second.
const PAN_SPEED: f32 = 400.0;
/// Multiplicative zoom step per key press or wheel notch.
const ZOOM_STEP: f32 = 1.25;

// ── Engine ──────────────────────────────────────────────────────────────────

/// World, systems, shared resources and a renderer, advanced one frame at a
/// time by the host.
pub struct Engine<R: SceneRenderer> {
    world: World,
    schedule: Schedule,
    resources: Resources,
    renderer: R,
    config: EngineConfig,
    maps: Vec<(MapLoad, Handle<MapReport>)>,
    maps_started: u32,
}

impl<R: SceneRenderer> Engine<R> {
    /// Builds the systems in update order: time of day, light effects, the
    /// three light registries, then tiles.
    pub fn new(config: EngineConfig, source: Box<dyn ImageSource>, renderer: R) -> Self {
        let textures = TextureCache::new(source).with_loads_per_pump(config.loads_per_pump);
        let camera = Camera::new(config.window.width as f32, config.window.height as f32);
        let mut engine = Self {
            world: World::new(),
            schedule: Schedule::new(),
            resources: Resources::new(textures, camera),
            renderer,
            config,
            maps: Vec::new(),
            maps_started: 0,
        };

        let cfg = engine.config.clone();
        engine.add_system(Box::new(TimeOfDaySystem::new(cfg.time_of_day.clone())));
        if cfg.effects.spotlight_rotation {
            engine.add_system(Box::new(SpotlightRotationSystem::new(
                cfg.effects.rotation_step,
                cfg.effects.rotation_interval,
            )));
        }
        engine.add_system(Box::new(LightBlinkSystem::new(LightKind::Point, cfg.effects.point_blink.clone())));
        engine.add_system(Box::new(LightBlinkSystem::new(LightKind::Spot, cfg.effects.spot_blink.clone())));
        for kind in LightKind::ALL {
            let kc = cfg.lighting.for_kind(kind);
            engine.add_system(Box::new(
                LightRegistry::new(kind).with_capacity(kc.capacity).with_policy(kc.dirty_policy),
            ));
        }
        let mut tiles = TileSystem::new();
        tiles.set_debug_outline(cfg.debug_outline);
        engine.add_system(Box::new(tiles));

        log::info!("engine: systems {:?}", engine.schedule.names());
        engine
    }

    fn add_system(&mut self, system: Box<dyn crate::ecs::schedule::System>) {
        let mut ctx = Context { res: &mut self.resources, renderer: &mut self.renderer };
        self.schedule.add_system(system, &mut self.world, &mut ctx);
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn world(&self) -> &World { &self.world }
    pub fn world_mut(&mut self) -> &mut World { &mut self.world }
    pub fn schedule(&self) -> &Schedule { &self.schedule }
    pub fn resources(&self) -> &Resources { &self.resources }
    pub fn renderer(&self) -> &R { &self.renderer }
    pub fn renderer_mut(&mut self) -> &mut R { &mut self.renderer }
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn camera(&self) -> &Camera { &self.resources.camera }
    pub fn camera_mut(&mut self) -> &mut Camera { &mut self.resources.camera }

    pub fn tiles(&self) -> Option<&TileSystem> {
        self.schedule.system::<TileSystem>()
    }

    pub fn time_of_day(&self) -> Option<&TimeOfDaySystem> {
        self.schedule.system::<TimeOfDaySystem>()
    }

    pub fn time_of_day_mut(&mut self) -> Option<&mut TimeOfDaySystem> {
        self.schedule.system_mut::<TimeOfDaySystem>()
    }

    /// Registry for `kind`, if one is scheduled.
    pub fn lights(&self, kind: LightKind) -> Option<&LightRegistry> {
        // Three registries share a type; find the right one by name.
        let name = match kind {
            LightKind::Directional => "directional_lights",
            LightKind::Point => "point_lights",
            LightKind::Spot => "spot_lights",
        };
        self.schedule.find::<LightRegistry>(name)
    }

    /// Map loads that have not settled yet.
    pub fn pending_maps(&self) -> usize {
        self.maps.len()
    }

    // ── Entities ───────────────────────────────────────────────────────────

    /// Spawn an entity and hand it to every interested system. The completion
    /// settles when all of them have finished with it (e.g. its tile texture
    /// is loaded).
    pub fn add_entity(&mut self, desc: EntityDesc) -> (Entity, Completion) {
        let entity = self.world.spawn_desc(desc);
        let mut ctx = Context { res: &mut self.resources, renderer: &mut self.renderer };
        let done = self.schedule.add_entity(entity, &mut self.world, &mut ctx);
        (entity, done)
    }

    pub fn remove_entity(&mut self, entity: Entity) {
        let mut ctx = Context { res: &mut self.resources, renderer: &mut self.renderer };
        self.schedule.remove_entity(entity, &mut self.world, &mut ctx);
    }

    // ── Maps ───────────────────────────────────────────────────────────────

    /// Start loading a map. Its tiles and lights are spawned by a later
    /// `advance`, once the atlas has been packed.
    pub fn load_map_json(&mut self, json: &str) -> EngineResult<Handle<MapReport>> {
        let data = map::parse_map(json)?;
        let layout = map::layout(&data);
        let name = format!("atlas:map{}", self.maps_started);
        self.maps_started += 1;
        log::info!("map: loading {} cells into '{name}'", layout.tiles.len());

        let handle = Handle::pending();
        self.maps.push((MapLoad::new(layout, &name), handle.clone()));
        Ok(handle)
    }

    pub fn load_map_file(&mut self, path: impl AsRef<Path>) -> EngineResult<Handle<MapReport>> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            log::error!("map: cannot read {}: {e}", path.display());
            e
        })?;
        self.load_map_json(&json)
    }

    fn poll_maps(&mut self) -> EngineResult<()> {
        let mut i = 0;
        while i < self.maps.len() {
            let polled = self.maps[i].0.poll(&mut self.resources.textures);
            match polled {
                Ok(None) => i += 1,
                Ok(Some(loaded)) => {
                    let (_, handle) = self.maps.remove(i);
                    for desc in loaded.entities {
                        self.add_entity(desc);
                    }
                    handle.resolve(Ok(loaded.report));
                }
                Err(err) => {
                    let (_, handle) = self.maps.remove(i);
                    log::error!("map: load failed: {err}");
                    handle.resolve(Err(err.clone()));
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    // ── Frame ──────────────────────────────────────────────────────────────

    /// One update: smooth the camera, pump image loads, finish map loads, run
    /// every system in order.
    pub fn advance(&mut self, dt: f32) -> EngineResult<()> {
        self.resources.camera.tick(dt);
        let loaded = self.resources.textures.pump();
        if loaded > 0 {
            log::trace!("engine: {loaded} images loaded this frame");
        }
        self.poll_maps()?;

        let mut ctx = Context { res: &mut self.resources, renderer: &mut self.renderer };
        self.schedule.advance(dt, &mut self.world, &mut ctx)
    }

    pub fn render(&mut self) -> EngineResult<()> {
        self.renderer.draw(&self.resources.materials, &self.resources.camera)
    }

    pub fn set_debug_outline(&mut self, enabled: bool) {
        self.config.debug_outline = enabled;
        if let Some(tiles) = self.schedule.system_mut::<TileSystem>() {
            tiles.set_debug_outline(enabled);
        }
    }

    pub fn toggle_debug_outline(&mut self) {
        self.set_debug_outline(!self.config.debug_outline);
    }

    /// Returns the new paused state.
    pub fn toggle_time_paused(&mut self) -> bool {
        match self.time_of_day_mut() {
            Some(clock) => {
                clock.toggle_paused();
                clock.is_paused()
            }
            None => false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.resources.camera.resize(width as f32, height as f32);
    }

    /// Free every GPU object: chunk meshes, materials, then textures.
    pub fn shutdown(&mut self) {
        let mut ctx = Context { res: &mut self.resources, renderer: &mut self.renderer };
        if let Some(tiles) = self.schedule.system_mut::<TileSystem>() {
            tiles.teardown(&mut self.world, &mut ctx);
        }
        self.schedule.flush(&mut self.world, &mut ctx);
        self.resources.teardown(&mut self.renderer);
        log::info!("engine: shut down");
    }
}

// ── EngineBuilder ───────────────────────────────────────────────────────────

type Setup = Box<dyn FnOnce(&mut Engine<WgpuRenderer>) -> EngineResult<()>>;

pub struct EngineBuilder {
    config: EngineConfig,
    source: Option<Box<dyn ImageSource>>,
    map_file: Option<PathBuf>,
    setup: Option<Setup>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self { config: EngineConfig::default(), source: None, map_file: None, setup: None }
    }
}

impl EngineBuilder {
    pub fn new() -> Self { Self::default() }
    pub fn with_config(mut self, config: EngineConfig) -> Self { self.config = config; self }
    pub fn with_title(mut self, title: &str) -> Self { self.config.window.title = title.into(); self }
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.window.width = width; self.config.window.height = height; self
    }
    pub fn with_ups(mut self, ups: u32) -> Self { self.config.target_ups = ups; self }
    pub fn with_debug_outline(mut self, enabled: bool) -> Self { self.config.debug_outline = enabled; self }

    /// Where image URIs are loaded from. Defaults to the files under
    /// `config.asset_root`.
    pub fn with_image_source(mut self, source: Box<dyn ImageSource>) -> Self {
        self.source = Some(source); self
    }

    pub fn with_map_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_file = Some(path.into()); self
    }

    /// Runs once the window and renderer exist, before the first update.
    pub fn with_setup(mut self, setup: impl FnOnce(&mut Engine<WgpuRenderer>) -> EngineResult<()> + 'static) -> Self {
        self.setup = Some(Box::new(setup)); self
    }

    /// Open the window and run until it is closed or an update fails.
    pub fn run(self) -> EngineResult<()> {
        let event_loop = EventLoop::new().map_err(|e| EngineError::Surface(e.to_string()))?;
        let fixed_dt = 1.0 / self.config.target_ups.max(1) as f32;
        let mut app = App {
            builder: self,
            engine: None,
            input: InputState::new(),
            actions: ActionMap::viewer_defaults(),
            last_instant: None,
            accumulator: 0.0,
            fixed_dt,
            failure: None,
        };
        event_loop.run_app(&mut app).map_err(|e| EngineError::Surface(e.to_string()))?;
        match app.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ── App (winit ApplicationHandler) ──────────────────────────────────────────

struct App {
    builder: EngineBuilder,
    engine: Option<Engine<WgpuRenderer>>,
    input: InputState,
    actions: ActionMap<Action>,
    last_instant: Option<Instant>,
    accumulator: f32,
    fixed_dt: f32,
    failure: Option<EngineError>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> EngineResult<Engine<WgpuRenderer>> {
        let cfg = &self.builder.config;
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title(&cfg.window.title)
                        .with_inner_size(winit::dpi::PhysicalSize::new(cfg.window.width, cfg.window.height))
                        .with_resizable(cfg.window.resizable),
                )
                .map_err(|e| EngineError::Surface(e.to_string()))?,
        );
        let renderer = pollster::block_on(WgpuRenderer::new(window))?;
        let source: Box<dyn ImageSource> = match self.builder.source.take() {
            Some(source) => source,
            None => {
                let files = FileImageSource::new(&cfg.asset_root);
                log::info!("assets: {} images under {}", files.discover().len(), files.root().display());
                Box::new(files)
            }
        };

        let mut engine = Engine::new(cfg.clone(), source, renderer);
        let size = engine.renderer().size();
        engine.resize(size.width, size.height);

        if let Some(path) = self.builder.map_file.take() {
            engine.load_map_file(&path)?;
        }
        if let Some(setup) = self.builder.setup.take() {
            setup(&mut engine)?;
        }
        Ok(engine)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: EngineError) {
        log::error!("fatal: {err}");
        if let Some(engine) = self.engine.as_mut() {
            engine.shutdown();
        }
        self.engine = None;
        self.failure = Some(err);
        event_loop.exit();
    }

    /// Apply held/pressed actions for one fixed step.
    fn apply_input(&mut self) {
        let Some(engine) = self.engine.as_mut() else { return };
        let step = PAN_SPEED * self.fixed_dt / engine.camera().zoom.max(0.05);
        let (mut dx, mut dy) = (0.0, 0.0);
        if self.actions.is_held(Action::PanLeft, &self.input) { dx -= step; }
        if self.actions.is_held(Action::PanRight, &self.input) { dx += step; }
        if self.actions.is_held(Action::PanUp, &self.input) { dy += step; }
        if self.actions.is_held(Action::PanDown, &self.input) { dy -= step; }
        if dx != 0.0 || dy != 0.0 {
            engine.camera_mut().pan(dx, dy);
        }

        let mut zoom = engine.camera().target_zoom;
        if self.actions.is_pressed(Action::ZoomIn, &self.input) { zoom *= ZOOM_STEP; }
        if self.actions.is_pressed(Action::ZoomOut, &self.input) { zoom /= ZOOM_STEP; }
        if self.input.mouse_wheel != 0.0 {
            zoom *= ZOOM_STEP.powf(self.input.mouse_wheel);
        }
        if zoom != engine.camera().target_zoom {
            engine.camera_mut().set_zoom(zoom);
        }

        if self.actions.is_pressed(Action::ToggleDebugOutline, &self.input) {
            engine.toggle_debug_outline();
        }
        if self.actions.is_pressed(Action::TogglePause, &self.input) {
            let paused = engine.toggle_time_paused();
            log::info!("time of day {}", if paused { "paused" } else { "running" });
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(engine) => self.engine = Some(engine),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.as_ref() {
            engine.renderer().window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(engine) = self.engine.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => {
                engine.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                engine.renderer_mut().resize(size);
                engine.resize(size.width, size.height);
            }

            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, y) => self.input.mouse_wheel += y,
                MouseScrollDelta::PixelDelta(pos) => self.input.mouse_wheel += (pos.y / 100.0) as f32,
            },

            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => match state {
                ElementState::Pressed => self.input.press_key(code),
                ElementState::Released => self.input.release_key(code),
            },

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let elapsed = match self.last_instant {
                    Some(prev) => now.duration_since(prev).as_secs_f32().min(0.25),
                    None => self.fixed_dt,
                };
                self.last_instant = Some(now);
                self.accumulator += elapsed;

                while self.accumulator >= self.fixed_dt {
                    self.apply_input();
                    // One-shot presses count for the first step only.
                    self.input.clear_frame_state();
                    let Some(engine) = self.engine.as_mut() else { return };
                    if let Err(err) = engine.advance(self.fixed_dt) {
                        self.fail(event_loop, err);
                        return;
                    }
                    self.accumulator -= self.fixed_dt;
                }

                let Some(engine) = self.engine.as_mut() else { return };
                if let Err(err) = engine.render() {
                    log::warn!("render error: {err}");
                }
            }

            _ => {}
        }
    }
}
