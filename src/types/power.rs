//! Power state for light control.

use serde::{Deserialize, Serialize};

/// Power state of a light.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum Power {
    /// The light is on
    On,
    /// The light is off
    #[default]
    Off,
}

impl Power {
    pub fn is_on(&self) -> bool {
        matches!(self, Power::On)
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Power::On } else { Power::Off }
    }
}
