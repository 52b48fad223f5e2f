//! Value types for light state and control parameters.

mod brightness;
mod effect;
mod hue_saturation;
mod power;

pub use brightness::Brightness;
pub use effect::{Effect, EffectMode};
pub use hue_saturation::HueSaturation;
pub use power::Power;
