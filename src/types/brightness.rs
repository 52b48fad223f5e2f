//! Brightness control for PixelAir lights.

use serde::{Deserialize, Serialize};

/// Brightness level from 0 to 255.
///
/// PixelAir devices report and accept the full byte range; 0 is dark but
/// does not turn the light off (power is a separate attribute).
///
/// # Examples
///
/// ```
/// use pixelair_rs::Brightness;
///
/// let b = Brightness::new(128);
/// assert_eq!(b.value(), 128);
/// assert_eq!(Brightness::default().value(), 255);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    pub const MAX: u8 = 255;

    pub fn new(value: u8) -> Self {
        Brightness { value }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Brightness { value: Self::MAX }
    }
}

impl From<u8> for Brightness {
    fn from(value: u8) -> Self {
        Brightness { value }
    }
}
