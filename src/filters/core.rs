//! Core color types and the channel clamp shared by every filter.
//!
//! Kernels compute in `f64` and hand back a [`RawColor`]. Conversion to the
//! stored 8-bit [`Color`] happens in exactly one place, [`clamp_channel`], so
//! every filter rounds and saturates the same way.

use serde::{Deserialize, Serialize};

/// Largest valid channel value.
pub const CHANNEL_MAX: u8 = 255;

// ============================================================================
// Color Clamp
// ============================================================================

/// Round a channel to the nearest integer and saturate it to [0, 255].
///
/// Rounding is "+0.5 then truncate toward zero", i.e. round-half-up for the
/// non-negative values filters produce. NaN maps to 0.
#[inline]
pub fn clamp_channel(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v + 0.5).trunc().clamp(0.0, CHANNEL_MAX as f64) as u8
}

// ============================================================================
// Color Types
// ============================================================================

/// An 8-bit RGB color as stored in a pixel buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Same intensity on all three channels.
    pub const fn gray(v: u8) -> Self {
        Self { r: v, g: v, b: v }
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Unclamped channel intensities produced by a kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RawColor {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub const fn splat(v: f64) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// Saturate into a storable color via [`clamp_channel`].
    pub fn clamp(self) -> Color {
        Color {
            r: clamp_channel(self.r),
            g: clamp_channel(self.g),
            b: clamp_channel(self.b),
        }
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
        }
    }
}

impl From<Color> for RawColor {
    fn from(c: Color) -> Self {
        Self {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
        }
    }
}
