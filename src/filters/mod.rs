//! Filter kernels and the engine that runs them.
//!
//! ## Kernel Classes
//!
//! | Class | Reads | Snapshot | Filters |
//! |-------|-------|----------|---------|
//! | Pointwise | the input pixel at the same coordinate | no | grayscale, sepia |
//! | Neighborhood | a window around the coordinate | yes | edge detection |
//!
//! ## Architecture
//!
//! All kernels follow these principles:
//! - **Pure per coordinate** - Output depends only on the visible input, never
//!   on output written earlier in the pass
//! - **Float inside, u8 outside** - Kernels return [`RawColor`]; rounding and
//!   saturation happen once, in [`core::clamp_channel`]
//! - **Thread-safe** - Kernels are `Send + Sync` so the engine can fan rows out
//!   over rayon

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod buffer;
pub mod color_adjust;
pub mod core;
pub mod edge;
pub mod engine;
pub mod grayscale;

pub use self::buffer::{PixelBuffer, PixelView, ReferenceSnapshot};
pub use self::color_adjust::Sepia;
pub use self::core::{clamp_channel, Color, RawColor};
pub use self::edge::SobelEdge;
pub use self::engine::{EngineOptions, EngineState, FilterEngine, Traversal};
pub use self::grayscale::Grayscale;

use crate::error::Result;

// ============================================================================
// Kernel Trait
// ============================================================================

/// How much of the input a kernel looks at per output pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelClass {
    Pointwise,
    Neighborhood,
}

/// A unit of per-pixel computation.
pub trait FilterKernel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn class(&self) -> KernelClass;

    /// Whether the engine must snapshot the input before the pass.
    fn requires_reference(&self) -> bool {
        self.class() == KernelClass::Neighborhood
    }

    /// Compute the output at `(x, y)`.
    ///
    /// `source` is the input buffer for pointwise kernels and the reference
    /// snapshot for neighborhood kernels.
    fn evaluate(&self, x: usize, y: usize, source: &PixelView<'_>) -> Result<RawColor>;
}

// ============================================================================
// Filter Selection
// ============================================================================

/// Identifier for one of the built-in kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Grayscale,
    Sepia,
    #[serde(alias = "sobel", alias = "edge")]
    EdgeDetect,
}

impl FilterKind {
    pub const ALL: [FilterKind; 3] = [FilterKind::Grayscale, FilterKind::Sepia, FilterKind::EdgeDetect];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Grayscale => "grayscale",
            FilterKind::Sepia => "sepia",
            FilterKind::EdgeDetect => "edge-detect",
        }
    }

    /// The kernel this identifier names.
    pub fn kernel(self) -> Box<dyn FilterKernel> {
        match self {
            FilterKind::Grayscale => Box::new(Grayscale),
            FilterKind::Sepia => Box::new(Sepia::default()),
            FilterKind::EdgeDetect => Box::new(SobelEdge),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a filter name matches no built-in kernel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter \"{0}\" (expected grayscale, sepia or edge-detect)")]
pub struct UnknownFilter(pub String);

impl FromStr for FilterKind {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(FilterKind::Grayscale),
            "sepia" => Ok(FilterKind::Sepia),
            "edge-detect" | "edge_detect" | "edge" | "sobel" => Ok(FilterKind::EdgeDetect),
            _ => Err(UnknownFilter(s.to_string())),
        }
    }
}
