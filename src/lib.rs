pub mod atlas;
pub mod camera;
pub mod completion;
pub mod config;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod input;
pub mod lighting;
pub mod map;
pub mod renderer;
pub mod resources;
pub mod systems;
pub mod tiles;

pub use completion::{Completion, Handle, LoadState, Status};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, EngineResult, ResourceError};
pub use lighting::light::{LightComponent, LightKind};
pub use renderer::{HeadlessRenderer, SceneRenderer, WgpuRenderer};
