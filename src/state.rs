//! Light state and availability tracking.

use serde::{Deserialize, Serialize};

use crate::types::{Brightness, Effect, HueSaturation, Power};

/// Online/Offline classification, distinct from the light's power state.
///
/// A device that stops responding is never removed from the registry; it
/// transitions to [`Availability::Offline`] and stays visible.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

/// The last known lighting values of a device.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LightState {
    pub(crate) power: Power,
    pub(crate) brightness: Brightness,
    pub(crate) color: HueSaturation,
    pub(crate) effect: Option<Effect>,
}

impl LightState {
    pub fn power(&self) -> Power {
        self.power
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn color(&self) -> HueSaturation {
        self.color
    }

    pub fn effect(&self) -> Option<Effect> {
        self.effect
    }
}
