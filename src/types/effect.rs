//! Lighting effects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How the device picks the animation it plays.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EffectMode {
    /// The device cycles effects on its own
    Auto,
    /// A preset scene slot
    Scene,
    /// A user-programmed slot
    Manual,
}

/// An active lighting effect, identified by mode and slot.
///
/// Effects are addressed by string ids of the form `"auto"`, `"scene:3"`,
/// or `"manual:1"`.
///
/// # Examples
///
/// ```
/// use pixelair_rs::{Effect, EffectMode};
///
/// let effect = Effect::scene(3);
/// assert_eq!(effect.id(), "scene:3");
/// assert_eq!(Effect::parse("scene:3"), Some(effect));
/// assert_eq!(Effect::parse("auto"), Some(Effect::auto()));
/// assert_eq!(Effect::parse("scene:x"), None);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    mode: EffectMode,
    slot: u8,
}

impl Effect {
    pub fn auto() -> Self {
        Effect {
            mode: EffectMode::Auto,
            slot: 0,
        }
    }

    pub fn scene(slot: u8) -> Self {
        Effect {
            mode: EffectMode::Scene,
            slot,
        }
    }

    pub fn manual(slot: u8) -> Self {
        Effect {
            mode: EffectMode::Manual,
            slot,
        }
    }

    pub fn mode(&self) -> EffectMode {
        self.mode
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// The string id the device protocol uses for this effect.
    pub fn id(&self) -> String {
        match self.mode {
            EffectMode::Auto => "auto".to_string(),
            mode => format!("{}:{}", mode, self.slot),
        }
    }

    /// Parse an effect id. Returns `None` for unrecognized ids.
    pub fn parse(id: &str) -> Option<Self> {
        match id.split_once(':') {
            None => {
                let mode = EffectMode::from_str(id).ok()?;
                matches!(mode, EffectMode::Auto).then(Effect::auto)
            }
            Some((mode, slot)) => {
                let mode = EffectMode::from_str(mode).ok()?;
                if mode == EffectMode::Auto {
                    // auto carries no slot
                    return None;
                }
                let slot = slot.parse().ok()?;
                Some(Effect { mode, slot })
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
