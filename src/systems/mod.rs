//! Systems that animate lights. They only mutate light components; the
//! registries in [`crate::lighting`] carry the changes to the shaders.

pub mod light_blink;
pub mod spotlight_rotation;
pub mod time_of_day;

pub use light_blink::LightBlinkSystem;
pub use spotlight_rotation::SpotlightRotationSystem;
pub use time_of_day::TimeOfDaySystem;
