use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::lighting::light::{DirtyPolicy, LightKind};
use crate::renderer::max_lights;

// ── WindowConfig ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "lumentile".into(), width: 1280, height: 720, resizable: true }
    }
}

impl WindowConfig {
    /// `width / height`, or `0.0` when the height is zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }
}

// ── LightingConfig ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightKindConfig {
    /// Slots available in each shader's array for this kind.
    pub capacity: u32,
    /// What happens to a light's dirty flag after it was propagated.
    pub dirty_policy: DirtyPolicy,
}

impl LightKindConfig {
    pub fn default_for(kind: LightKind) -> Self {
        Self { capacity: max_lights(kind), dirty_policy: DirtyPolicy::default_for(kind) }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub directional: LightKindConfig,
    pub point: LightKindConfig,
    pub spot: LightKindConfig,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            directional: LightKindConfig::default_for(LightKind::Directional),
            point: LightKindConfig::default_for(LightKind::Point),
            spot: LightKindConfig::default_for(LightKind::Spot),
        }
    }
}

impl LightingConfig {
    pub fn for_kind(&self, kind: LightKind) -> LightKindConfig {
        match kind {
            LightKind::Directional => self.directional,
            LightKind::Point => self.point,
            LightKind::Spot => self.spot,
        }
    }
}

// ── TimeOfDayConfig ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOfDayConfig {
    pub enabled: bool,
    /// Starting minute in the 1440-minute cycle.
    pub start_minute: f32,
    /// Real seconds per in-game minute.
    pub seconds_per_minute: f32,
    pub paused: bool,
    /// Constant y component of the sun direction.
    pub sun_y: f32,
    pub dawn: f32,
    pub dusk: f32,
    /// Steepness of the daylight parabola.
    pub light_speed: f32,
    /// Daylight values above this are full white.
    pub light_threshold: f32,
}

impl Default for TimeOfDayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_minute: 0.0,
            seconds_per_minute: 0.005,
            paused: false,
            sun_y: 0.3,
            dawn: 240.0,
            dusk: 1320.0,
            light_speed: 20.0,
            light_threshold: 1.0,
        }
    }
}

// ── EffectsConfig ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    pub enabled: bool,
    /// Seconds between toggles.
    pub interval: f32,
    /// Pick on/off at random instead of alternating.
    pub random: bool,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self { enabled: false, interval: 0.05, random: false }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub spotlight_rotation: bool,
    /// Radians about z per step.
    pub rotation_step: f32,
    /// Seconds per step.
    pub rotation_interval: f32,
    pub point_blink: BlinkConfig,
    pub spot_blink: BlinkConfig,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            spotlight_rotation: true,
            rotation_step: 0.025,
            rotation_interval: 1.0 / 30.0,
            point_blink: BlinkConfig::default(),
            spot_blink: BlinkConfig::default(),
        }
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub lighting: LightingConfig,
    pub time_of_day: TimeOfDayConfig,
    pub effects: EffectsConfig,
    /// Image loads performed per frame.
    pub loads_per_pump: usize,
    /// Fixed update rate of the host loop.
    pub target_ups: u32,
    pub debug_outline: bool,
    /// Directory image URIs are resolved against.
    pub asset_root: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            lighting: LightingConfig::default(),
            time_of_day: TimeOfDayConfig::default(),
            effects: EffectsConfig::default(),
            loads_per_pump: 4,
            target_ups: 60,
            debug_outline: false,
            asset_root: "assets".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "window": { "width": 640 }, "lighting": { "point": { "capacity": 4, "dirty_policy": "clear" } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.height, 720);
        assert_eq!(cfg.lighting.point.capacity, 4);
        assert_eq!(cfg.lighting.point.dirty_policy, DirtyPolicy::Clear);
        assert_eq!(cfg.lighting.spot.dirty_policy, DirtyPolicy::Persist);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(EngineConfig::from_json_str("{ nope"), Err(EngineError::Config(_))));
    }

    #[test]
    fn aspect_ratio_handles_zero_height() {
        let w = WindowConfig { height: 0, ..WindowConfig::default() };
        assert_eq!(w.aspect_ratio(), 0.0);
        assert!((WindowConfig::default().aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn round_trips_through_json() {
        let mut cfg = EngineConfig::default();
        cfg.effects.point_blink.enabled = true;
        let back = EngineConfig::from_json_str(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
