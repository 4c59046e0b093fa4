//! Grayscale conversion filter.
//!
//! Uses the plain channel average with integer (floor) division, so the
//! result never rounds up: (1, 1, 2) becomes (1, 1, 1). Sepia and edge
//! detection round half-up instead; the two conventions are intentional.

use crate::error::Result;
use crate::filters::core::RawColor;
use crate::filters::{FilterKernel, KernelClass, PixelView};

/// Average-of-channels grayscale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl Grayscale {
    /// `floor((r + g + b) / 3)` on 8-bit channels.
    #[inline]
    pub fn average(r: u8, g: u8, b: u8) -> u8 {
        ((r as u16 + g as u16 + b as u16) / 3) as u8
    }
}

impl FilterKernel for Grayscale {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn class(&self) -> KernelClass {
        KernelClass::Pointwise
    }

    fn evaluate(&self, x: usize, y: usize, source: &PixelView<'_>) -> Result<RawColor> {
        let c = source.get(x, y)?;
        Ok(RawColor::splat(Self::average(c.r, c.g, c.b) as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Color, PixelBuffer};

    fn eval(color: Color) -> Color {
        let buf = PixelBuffer::filled(1, 1, color);
        Grayscale.evaluate(0, 0, &buf.view()).unwrap().clamp()
    }

    #[test]
    fn test_grayscale_exact_average() {
        // (60 + 90 + 120) / 3 = 90
        assert_eq!(eval(Color::new(60, 90, 120)), Color::gray(90));
    }

    #[test]
    fn test_grayscale_truncates() {
        // 4 / 3 = 1.33, 5 / 3 = 1.67: both floor to 1
        assert_eq!(eval(Color::new(1, 1, 2)), Color::gray(1));
        assert_eq!(eval(Color::new(1, 2, 2)), Color::gray(1));
    }

    #[test]
    fn test_grayscale_extremes() {
        assert_eq!(eval(Color::WHITE), Color::WHITE);
        assert_eq!(eval(Color::BLACK), Color::BLACK);
        assert_eq!(eval(Color::new(255, 0, 0)), Color::gray(85));
    }

    #[test]
    fn test_grayscale_out_of_range() {
        let buf = PixelBuffer::new(1, 1);
        assert!(Grayscale.evaluate(1, 0, &buf.view()).is_err());
    }
}
