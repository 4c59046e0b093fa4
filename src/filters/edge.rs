//! Edge detection filter: Sobel gradient magnitude.
//!
//! Each color channel is processed independently, so colored edges stay
//! colored. Output per channel is `sqrt(Gx^2 + Gy^2)`, rounded half-up and
//! saturated at 255.
//!
//! ## Borders
//!
//! Neighbors that fall outside the image are skipped: they add nothing to
//! either gradient sum. A corner pixel therefore sums 3 neighbors, an edge
//! pixel 5, and an interior pixel all 8.
//!
//! ## Reference Snapshot
//!
//! Sobel is a neighborhood filter, so the engine hands it a snapshot of the
//! original image. Sampling the buffer being written would let later pixels
//! see already-filtered neighbors.

use crate::error::Result;
use crate::filters::core::RawColor;
use crate::filters::{FilterKernel, KernelClass, PixelView};

/// Horizontal Sobel weights, indexed `[dy + 1][dx + 1]`.
pub const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];

/// Vertical Sobel weights, indexed `[dy + 1][dx + 1]`.
pub const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Per-channel gradient sums at one coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gradient {
    pub gx: [f64; 3],
    pub gy: [f64; 3],
    /// In-bounds neighbors that contributed.
    pub samples: usize,
}

impl Gradient {
    /// Gradient magnitude per channel, unclamped.
    pub fn magnitude(&self) -> RawColor {
        let mag = |c: usize| (self.gx[c] * self.gx[c] + self.gy[c] * self.gy[c]).sqrt();
        RawColor::new(mag(0), mag(1), mag(2))
    }
}

/// Per-channel Sobel edge detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct SobelEdge;

impl SobelEdge {
    /// Accumulate Gx and Gy over the in-bounds 8-neighborhood of `(x, y)`.
    pub fn gradient(x: usize, y: usize, source: &PixelView<'_>) -> Gradient {
        let mut grad = Gradient::default();

        for ky in 0..3 {
            for kx in 0..3 {
                if ky == 1 && kx == 1 {
                    continue;
                }
                let px = x as i64 + kx as i64 - 1;
                let py = y as i64 + ky as i64 - 1;
                let Some(c) = source.try_get(px, py) else {
                    continue;
                };

                let wx = SOBEL_X[ky][kx] as f64;
                let wy = SOBEL_Y[ky][kx] as f64;
                for (i, v) in c.channels().into_iter().enumerate() {
                    grad.gx[i] += wx * v as f64;
                    grad.gy[i] += wy * v as f64;
                }
                grad.samples += 1;
            }
        }

        grad
    }
}

impl FilterKernel for SobelEdge {
    fn name(&self) -> &'static str {
        "edge-detect"
    }

    fn class(&self) -> KernelClass {
        KernelClass::Neighborhood
    }

    fn evaluate(&self, x: usize, y: usize, source: &PixelView<'_>) -> Result<RawColor> {
        // Validates the center even though it carries no weight
        source.get(x, y)?;
        Ok(Self::gradient(x, y, source).magnitude())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Color, PixelBuffer};

    #[test]
    fn test_sobel_sample_counts() {
        let buf = PixelBuffer::new(4, 3);
        let view = buf.view();
        assert_eq!(SobelEdge::gradient(0, 0, &view).samples, 3);
        assert_eq!(SobelEdge::gradient(3, 2, &view).samples, 3);
        assert_eq!(SobelEdge::gradient(1, 0, &view).samples, 5);
        assert_eq!(SobelEdge::gradient(0, 1, &view).samples, 5);
        assert_eq!(SobelEdge::gradient(1, 1, &view).samples, 8);
    }

    #[test]
    fn test_sobel_single_pixel_is_zero() {
        let buf = PixelBuffer::filled(1, 1, Color::WHITE);
        let grad = SobelEdge::gradient(0, 0, &buf.view());
        assert_eq!(grad.samples, 0);
        assert_eq!(SobelEdge.evaluate(0, 0, &buf.view()).unwrap().clamp(), Color::BLACK);
    }

    #[test]
    fn test_sobel_corner_skips_missing_neighbors() {
        // 2x2: only (1,0), (0,1), (1,1) are neighbors of (0,0)
        let mut buf = PixelBuffer::new(2, 2);
        buf.set(1, 0, Color::new(10, 0, 0)).unwrap();
        buf.set(0, 1, Color::new(0, 10, 0)).unwrap();
        buf.set(1, 1, Color::new(0, 0, 10)).unwrap();

        let grad = SobelEdge::gradient(0, 0, &buf.view());
        // (1,0): wx = 2, wy = 0. (0,1): wx = 0, wy = 2. (1,1): wx = 1, wy = 1
        assert_eq!(grad.gx, [20.0, 0.0, 10.0]);
        assert_eq!(grad.gy, [0.0, 20.0, 10.0]);

        // sqrt(100 + 100) = 14.14 -> 14
        let out = grad.magnitude().clamp();
        assert_eq!(out, Color::new(20, 20, 14));
    }

    #[test]
    fn test_sobel_vertical_edge() {
        // Left column black, right two columns white
        let mut buf = PixelBuffer::new(3, 3);
        for y in 0..3 {
            for x in 1..3 {
                buf.set(x, y, Color::WHITE).unwrap();
            }
        }
        let view = buf.view();

        let grad = SobelEdge::gradient(1, 1, &view);
        // Gx = (1 + 2 + 1) * 255, Gy cancels
        assert_eq!(grad.gx[0], 1020.0);
        assert_eq!(grad.gy[0], 0.0);
        assert_eq!(SobelEdge.evaluate(1, 1, &view).unwrap().clamp(), Color::WHITE);
    }

    #[test]
    fn test_sobel_channels_independent() {
        let mut buf = PixelBuffer::new(3, 1);
        buf.set(2, 0, Color::new(50, 0, 0)).unwrap();
        let out = SobelEdge.evaluate(1, 0, &buf.view()).unwrap().clamp();
        // only red sees the step: gx = 2 * 50
        assert_eq!(out, Color::new(100, 0, 0));
    }
}
