//! Pixel storage: the mutable [`PixelBuffer`], its frozen
//! [`ReferenceSnapshot`], and the read-only [`PixelView`] kernels sample.
//!
//! ## Layout
//!
//! Pixels live in an `Array3<u8>` of shape (height, width, 3), the same
//! (H, W, C) layout numpy and the bindings use. Coordinates are always given
//! as `(x, y)` and translated to `[[y, x, c]]` internally.

use ndarray::{s, Array2, Array3, ArrayView3, Axis};

use crate::error::{FilterError, Result};
use crate::filters::core::{Color, RawColor};

/// Channels per pixel in a [`PixelBuffer`].
pub const CHANNELS: usize = 3;

// ============================================================================
// PixelView
// ============================================================================

/// Read-only, bounds-checked window onto pixel data.
///
/// Handed to kernels in place of the buffer itself so a kernel can never
/// observe the output being written in the same pass.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    pixels: ArrayView3<'a, u8>,
}

impl<'a> PixelView<'a> {
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// Color at `(x, y)`, or `OutOfRange`.
    pub fn get(&self, x: usize, y: usize) -> Result<Color> {
        self.try_get(x as i64, y as i64).ok_or(FilterError::OutOfRange {
            x: x as i64,
            y: y as i64,
            width: self.width(),
            height: self.height(),
        })
    }

    /// Color at a signed coordinate, `None` when it falls off the image.
    #[inline]
    pub fn try_get(&self, x: i64, y: i64) -> Option<Color> {
        if x < 0 || y < 0 || x as usize >= self.width() || y as usize >= self.height() {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        Some(Color::new(
            self.pixels[[y, x, 0]],
            self.pixels[[y, x, 1]],
            self.pixels[[y, x, 2]],
        ))
    }
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// A width x height grid of RGB colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Array3<u8>,
}

impl PixelBuffer {
    /// All-black buffer. Either dimension may be zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: Array3::zeros((height, width, CHANNELS)),
        }
    }

    /// Buffer filled with one color.
    pub fn filled(width: usize, height: usize, color: Color) -> Self {
        let mut pixels = Array3::zeros((height, width, CHANNELS));
        for (c, v) in color.channels().into_iter().enumerate() {
            pixels.slice_mut(s![.., .., c]).fill(v);
        }
        Self { pixels }
    }

    /// Wrap packed row-major RGB bytes (`width * height * 3` of them).
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * CHANNELS;
        if data.len() != expected {
            return Err(FilterError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        let pixels = Array3::from_shape_vec((height, width, CHANNELS), data).map_err(|_| {
            FilterError::DimensionMismatch {
                expected,
                actual: expected,
            }
        })?;
        Ok(Self { pixels })
    }

    /// Wrap an (H, W, 3) array.
    pub fn from_array(pixels: Array3<u8>) -> Result<Self> {
        let channels = pixels.dim().2;
        if channels != CHANNELS {
            return Err(FilterError::DimensionMismatch {
                expected: CHANNELS,
                actual: channels,
            });
        }
        Ok(Self { pixels })
    }

    /// Split an (H, W, 3) or (H, W, 4) array into color data and alpha.
    ///
    /// Filters only touch RGB; the returned alpha plane is carried alongside
    /// and put back by [`PixelBuffer::into_channels`].
    pub fn from_channels(input: ArrayView3<u8>) -> Result<(Self, Option<Array2<u8>>)> {
        match input.dim().2 {
            3 => Ok((Self { pixels: input.to_owned() }, None)),
            4 => {
                let pixels = input.slice(s![.., .., 0..3]).to_owned();
                let alpha = input.index_axis(Axis(2), 3).to_owned();
                Ok((Self { pixels }, Some(alpha)))
            }
            channels => Err(FilterError::DimensionMismatch {
                expected: CHANNELS,
                actual: channels,
            }),
        }
    }

    /// Reattach an alpha plane taken by [`PixelBuffer::from_channels`].
    pub fn into_channels(self, alpha: Option<Array2<u8>>) -> Result<Array3<u8>> {
        let Some(alpha) = alpha else {
            return Ok(self.pixels);
        };
        let (height, width, _) = self.pixels.dim();
        if alpha.dim() != (height, width) {
            return Err(FilterError::DimensionMismatch {
                expected: width * height,
                actual: alpha.len(),
            });
        }
        let mut output = Array3::<u8>::zeros((height, width, 4));
        output.slice_mut(s![.., .., 0..3]).assign(&self.pixels);
        output.index_axis_mut(Axis(2), 3).assign(&alpha);
        Ok(output)
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// True for zero-area buffers.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn get(&self, x: usize, y: usize) -> Result<Color> {
        self.view().get(x, y)
    }

    /// Store a color, rounding and saturating each channel first.
    pub fn set(&mut self, x: usize, y: usize, color: impl Into<RawColor>) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        if x >= width || y >= height {
            return Err(FilterError::OutOfRange {
                x: x as i64,
                y: y as i64,
                width,
                height,
            });
        }
        let color = color.into().clamp();
        self.pixels[[y, x, 0]] = color.r;
        self.pixels[[y, x, 1]] = color.g;
        self.pixels[[y, x, 2]] = color.b;
        Ok(())
    }

    /// Every coordinate in row-major order.
    pub fn coordinates(&self) -> impl Iterator<Item = (usize, usize)> {
        let (width, height) = (self.width(), self.height());
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }

    pub fn view(&self) -> PixelView<'_> {
        PixelView {
            pixels: self.pixels.view(),
        }
    }

    pub fn as_array(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Packed row-major RGB bytes.
    pub fn into_raw(self) -> Vec<u8> {
        if self.pixels.is_standard_layout() {
            self.pixels.into_raw_vec_and_offset().0
        } else {
            self.pixels.iter().copied().collect()
        }
    }
}

// ============================================================================
// ReferenceSnapshot
// ============================================================================

/// Frozen copy of a buffer taken before a neighborhood pass writes anything.
///
/// There is no way to mutate a snapshot once captured.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    pixels: Array3<u8>,
}

impl ReferenceSnapshot {
    /// Deep copy of `buffer` as it is right now.
    pub fn capture(buffer: &PixelBuffer) -> Self {
        Self {
            pixels: buffer.pixels.clone(),
        }
    }

    pub fn view(&self) -> PixelView<'_> {
        PixelView {
            pixels: self.pixels.view(),
        }
    }
}
