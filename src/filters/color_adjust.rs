//! Color adjustment filters: Sepia.
//!
//! Pixel-wise operations that don't require spatial context. Each output
//! channel is a fixed linear mix of the input channels, rounded half-up and
//! saturated at 255 by the shared clamp.

use crate::error::Result;
use crate::filters::core::RawColor;
use crate::filters::{FilterKernel, KernelClass, PixelView};

// ============================================================================
// Sepia
// ============================================================================

/// Classic sepia tone matrix (rows produce r, g, b).
pub const SEPIA_MATRIX: [[f64; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Sepia toning via a 3x3 channel mixing matrix.
#[derive(Debug, Clone, Copy)]
pub struct Sepia {
    matrix: [[f64; 3]; 3],
}

impl Sepia {
    /// Sepia with a custom mixing matrix.
    pub fn with_matrix(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }
}

impl Default for Sepia {
    fn default() -> Self {
        Self::with_matrix(SEPIA_MATRIX)
    }
}

impl FilterKernel for Sepia {
    fn name(&self) -> &'static str {
        "sepia"
    }

    fn class(&self) -> KernelClass {
        KernelClass::Pointwise
    }

    fn evaluate(&self, x: usize, y: usize, source: &PixelView<'_>) -> Result<RawColor> {
        let c = source.get(x, y)?;
        let (r, g, b) = (c.r as f64, c.g as f64, c.b as f64);
        let mix = |row: [f64; 3]| row[0] * r + row[1] * g + row[2] * b;

        Ok(RawColor::new(
            mix(self.matrix[0]),
            mix(self.matrix[1]),
            mix(self.matrix[2]),
        ))
    }
}
