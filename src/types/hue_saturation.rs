//! Hue and Saturation color representation.

use serde::{Deserialize, Serialize};

/// Hue and Saturation color representation.
///
/// PixelAir devices are HS-native:
/// - Hue: the color angle on the color wheel (0-360 degrees)
/// - Saturation: the intensity of the color (0-100 percent)
///
/// On the wire the device expects both channels normalized to `0.0..=1.0`;
/// use [`hue_ratio`](Self::hue_ratio) and
/// [`saturation_ratio`](Self::saturation_ratio) for that.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct HueSaturation {
    hue: u16,
    saturation: u8,
}

impl HueSaturation {
    /// Create a color, returning `None` when either channel is out of
    /// range.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixelair_rs::HueSaturation;
    ///
    /// assert!(HueSaturation::create(0, 100).is_some());   // full red
    /// assert!(HueSaturation::create(120, 50).is_some());  // half-saturated green
    /// assert!(HueSaturation::create(361, 50).is_none());  // hue past 360
    /// assert!(HueSaturation::create(180, 101).is_none()); // saturation past 100
    /// ```
    pub fn create(hue: u16, saturation: u8) -> Option<Self> {
        if hue <= 360 && saturation <= 100 {
            Some(HueSaturation { hue, saturation })
        } else {
            None
        }
    }

    /// Create a HueSaturation, clamping out-of-range values.
    pub fn create_or(hue: u16, saturation: u8) -> Self {
        HueSaturation {
            hue: hue.min(360),
            saturation: saturation.min(100),
        }
    }

    /// Get the hue value in degrees (0-360).
    pub fn hue(&self) -> u16 {
        self.hue
    }

    /// Get the saturation value in percent (0-100).
    pub fn saturation(&self) -> u8 {
        self.saturation
    }

    /// Hue normalized to `0.0..=1.0` as the device expects it.
    pub fn hue_ratio(&self) -> f32 {
        f32::from(self.hue) / 360.0
    }

    /// Saturation normalized to `0.0..=1.0` as the device expects it.
    pub fn saturation_ratio(&self) -> f32 {
        f32::from(self.saturation) / 100.0
    }
}
