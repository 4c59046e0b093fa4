//! Filter engine: traversal, dispatch, and commit.
//!
//! A pass runs in three steps:
//! 1. If the kernel is a neighborhood kernel, capture a [`ReferenceSnapshot`]
//!    of the input. This happens once per pass, before any pixel is computed.
//! 2. Evaluate the kernel at every coordinate against the input (pointwise)
//!    or the snapshot (neighborhood).
//! 3. Write each result into a fresh output buffer of the same size.
//!
//! Kernels never see the output, so the traversal order cannot change the
//! result. [`Traversal::Parallel`] relies on this to split rows across rayon
//! workers without locks: the snapshot is immutable and each worker owns
//! disjoint output rows.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::filters::buffer::{PixelBuffer, PixelView, ReferenceSnapshot, CHANNELS};
use crate::filters::{FilterKernel, FilterKind};

// ============================================================================
// Configuration
// ============================================================================

/// Order in which the engine visits coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Traversal {
    /// y outer, x inner, single thread.
    RowMajor,
    /// x outer, y inner, single thread.
    ColumnMajor,
    /// Rows in parallel on the rayon pool.
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub traversal: Traversal,
}

/// Whether a pass is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
}

// ============================================================================
// FilterEngine
// ============================================================================

#[derive(Debug)]
pub struct FilterEngine {
    options: EngineOptions,
    state: EngineState,
    passes: u64,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::with_options(EngineOptions::default())
    }
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            state: EngineState::Idle,
            passes: 0,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Completed passes since construction.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run `kernel` over `input` and return the filtered copy.
    ///
    /// `input` is never modified. On error no output is produced.
    pub fn apply(&mut self, input: &PixelBuffer, kernel: &dyn FilterKernel) -> Result<PixelBuffer> {
        let traversal = self.options.traversal;
        self.run(input, kernel, |source, output| match traversal {
            Traversal::RowMajor => {
                let order = row_major(output.width(), output.height());
                evaluate_in_order(kernel, source, output, order)
            }
            Traversal::ColumnMajor => {
                let order = column_major(output.width(), output.height());
                evaluate_in_order(kernel, source, output, order)
            }
            Traversal::Parallel => evaluate_parallel(kernel, source, output),
        })
    }

    /// Run the built-in kernel named by `kind`.
    pub fn apply_kind(&mut self, input: &PixelBuffer, kind: FilterKind) -> Result<PixelBuffer> {
        let kernel = kind.kernel();
        self.apply(input, kernel.as_ref())
    }

    /// Run `kernel` visiting coordinates in exactly the given order.
    ///
    /// The order must name every coordinate once. A coordinate off the image
    /// is `OutOfRange`; a repeated or missing one is `DimensionMismatch`.
    pub fn apply_in_order<I>(
        &mut self,
        input: &PixelBuffer,
        kernel: &dyn FilterKernel,
        order: I,
    ) -> Result<PixelBuffer>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        self.run(input, kernel, |source, output| {
            evaluate_in_order(kernel, source, output, order)
        })
    }

    fn run<F>(&mut self, input: &PixelBuffer, kernel: &dyn FilterKernel, traverse: F) -> Result<PixelBuffer>
    where
        F: FnOnce(&PixelView<'_>, &mut PixelBuffer) -> Result<()>,
    {
        let (width, height) = (input.width(), input.height());
        debug!(
            "filter pass start: kernel={} size={}x{} traversal={:?}",
            kernel.name(),
            width,
            height,
            self.options.traversal
        );

        self.state = EngineState::Running;
        let mut output = PixelBuffer::new(width, height);

        let snapshot = kernel.requires_reference().then(|| ReferenceSnapshot::capture(input));
        let source = match &snapshot {
            Some(snapshot) => snapshot.view(),
            None => input.view(),
        };

        let result = traverse(&source, &mut output);
        self.state = EngineState::Idle;

        match result {
            Ok(()) => {
                self.passes += 1;
                debug!("filter pass done: kernel={} pass={}", kernel.name(), self.passes);
                Ok(output)
            }
            Err(err) => {
                debug!("filter pass aborted: kernel={} error={}", kernel.name(), err);
                Err(err)
            }
        }
    }
}

// ============================================================================
// Traversal
// ============================================================================

fn row_major(width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
}

fn column_major(width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..width).flat_map(move |x| (0..height).map(move |y| (x, y)))
}

fn evaluate_in_order<I>(
    kernel: &dyn FilterKernel,
    source: &PixelView<'_>,
    output: &mut PixelBuffer,
    order: I,
) -> Result<()>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let (width, height) = (output.width(), output.height());
    let total = width * height;
    let mut visited = vec![false; total];
    let mut count = 0usize;

    for (x, y) in order {
        if x >= width || y >= height {
            return Err(FilterError::OutOfRange {
                x: x as i64,
                y: y as i64,
                width,
                height,
            });
        }
        let seen = &mut visited[y * width + x];
        if *seen {
            return Err(FilterError::DimensionMismatch {
                expected: total,
                actual: count + 1,
            });
        }
        *seen = true;
        count += 1;

        let color = kernel.evaluate(x, y, source)?;
        output.set(x, y, color)?;
    }

    if count != total {
        return Err(FilterError::DimensionMismatch {
            expected: total,
            actual: count,
        });
    }
    Ok(())
}

fn evaluate_parallel(kernel: &dyn FilterKernel, source: &PixelView<'_>, output: &mut PixelBuffer) -> Result<()> {
    let (width, height) = (output.width(), output.height());
    if output.is_empty() {
        return Ok(());
    }

    let row_len = width * CHANNELS;
    let mut data = vec![0u8; row_len * height];

    data.par_chunks_mut(row_len)
        .enumerate()
        .try_for_each(|(y, row)| -> Result<()> {
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let color = kernel.evaluate(x, y, source)?.clamp();
                px.copy_from_slice(&color.channels());
            }
            Ok(())
        })?;

    *output = PixelBuffer::from_raw(width, height, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{clamp_channel, Color, Grayscale, KernelClass, RawColor, Sepia, SobelEdge};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALL_TRAVERSALS: [Traversal; 3] = [Traversal::RowMajor, Traversal::ColumnMajor, Traversal::Parallel];

    /// Deterministic test image with plenty of gradient.
    fn test_image(width: usize, height: usize) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 37 + y * 11) % 256;
                let g = (x * x * 5 + y * 3) % 256;
                let b = (x * 13 + y * y * 7 + 100) % 256;
                buf.set(x, y, Color::new(r as u8, g as u8, b as u8)).unwrap();
            }
        }
        buf
    }

    fn engine(traversal: Traversal) -> FilterEngine {
        FilterEngine::with_options(EngineOptions { traversal })
    }

    struct CountingKernel {
        calls: AtomicUsize,
    }

    impl FilterKernel for CountingKernel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn class(&self) -> KernelClass {
            KernelClass::Pointwise
        }

        fn evaluate(&self, _x: usize, _y: usize, _source: &PixelView<'_>) -> Result<RawColor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawColor::splat(1.0))
        }
    }

    struct FailAt(usize, usize);

    impl FilterKernel for FailAt {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn class(&self) -> KernelClass {
            KernelClass::Pointwise
        }

        fn evaluate(&self, x: usize, y: usize, source: &PixelView<'_>) -> Result<RawColor> {
            if (x, y) == (self.0, self.1) {
                source.get(usize::MAX, 0)?;
            }
            Ok(RawColor::splat(0.0))
        }
    }

    #[test]
    fn test_grayscale_single_pixel() {
        let input = PixelBuffer::filled(1, 1, Color::new(60, 90, 120));
        for traversal in ALL_TRAVERSALS {
            let out = engine(traversal).apply(&input, &Grayscale).unwrap();
            assert_eq!(out.get(0, 0), Ok(Color::gray(90)));
        }
    }

    #[test]
    fn test_grayscale_idempotent() {
        let mut engine = FilterEngine::new();
        let once = engine.apply(&test_image(9, 7), &Grayscale).unwrap();
        let twice = engine.apply(&once, &Grayscale).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sepia_white() {
        let input = PixelBuffer::filled(2, 2, Color::WHITE);
        let out = FilterEngine::new().apply_kind(&input, FilterKind::Sepia).unwrap();
        for (x, y) in out.coordinates() {
            assert_eq!(out.get(x, y), Ok(Color::new(255, 255, 239)));
        }
    }

    #[test]
    fn test_edge_uniform_interior_is_zero() {
        // Skipped neighbors leave border gradients one-sided: a corner of
        // value v sums Gx = Gy = 3v, any other border pixel 4v on one axis
        let (width, height, v) = (6, 4, 20.0);
        let input = PixelBuffer::filled(width, height, Color::gray(v as u8));
        let corner = Color::gray(clamp_channel((2.0f64).sqrt() * 3.0 * v));
        let side = Color::gray(clamp_channel(4.0 * v));
        assert_eq!((corner, side), (Color::gray(85), Color::gray(80)));

        for traversal in ALL_TRAVERSALS {
            let out = engine(traversal).apply(&input, &SobelEdge).unwrap();
            for (x, y) in out.coordinates() {
                let on_x_edge = x == 0 || x == width - 1;
                let on_y_edge = y == 0 || y == height - 1;
                let expected = match (on_x_edge, on_y_edge) {
                    (true, true) => corner,
                    (true, false) | (false, true) => side,
                    (false, false) => Color::BLACK,
                };
                assert_eq!(out.get(x, y), Ok(expected), "pixel ({x}, {y})");
            }
        }

        // Brighter channels saturate at the corners
        let out = FilterEngine::new()
            .apply(&PixelBuffer::filled(width, height, Color::new(120, 33, 250)), &SobelEdge)
            .unwrap();
        assert_eq!(out.get(0, 0), Ok(Color::new(255, 140, 255)));
        assert_eq!(out.get(2, 1), Ok(Color::BLACK));
    }

    #[test]
    fn test_edge_single_pixel_is_zero() {
        let input = PixelBuffer::filled(1, 1, Color::WHITE);
        let out = FilterEngine::new().apply(&input, &SobelEdge).unwrap();
        assert_eq!(out.get(0, 0), Ok(Color::BLACK));
    }

    #[test]
    fn test_edge_reads_original_not_output() {
        // A single bright pixel: neighbors on both sides must see it as
        // bright even after the center has been overwritten.
        let mut input = PixelBuffer::new(3, 1);
        input.set(1, 0, Color::gray(60)).unwrap();

        for traversal in ALL_TRAVERSALS {
            let out = engine(traversal).apply(&input, &SobelEdge).unwrap();
            assert_eq!(out.get(0, 0), Ok(Color::gray(120)));
            assert_eq!(out.get(1, 0), Ok(Color::BLACK));
            assert_eq!(out.get(2, 0), Ok(Color::gray(120)));
        }
        assert_eq!(input.get(1, 0), Ok(Color::gray(60)));
    }

    #[test]
    fn test_adversarial_edges_saturate() {
        // Checkerboard of black and white: every gradient far exceeds 255
        let mut input = PixelBuffer::new(5, 5);
        for (x, y) in input.coordinates().collect::<Vec<_>>() {
            if (x + y) % 2 == 0 {
                input.set(x, y, Color::WHITE).unwrap();
            }
        }
        let out = FilterEngine::new().apply(&input, &SobelEdge).unwrap();
        // Interior pixels sum symmetric neighbors and cancel; borders do not
        assert_eq!(out.get(2, 2), Ok(Color::BLACK));
        assert_eq!(out.get(0, 1), Ok(Color::WHITE));
    }

    #[test]
    fn test_traversals_agree() {
        let input = test_image(13, 8);
        for kind in FilterKind::ALL {
            let reference = engine(Traversal::RowMajor).apply_kind(&input, kind).unwrap();
            for traversal in ALL_TRAVERSALS {
                assert_eq!(engine(traversal).apply_kind(&input, kind).unwrap(), reference);
            }

            let reversed: Vec<_> = input.coordinates().collect::<Vec<_>>().into_iter().rev().collect();
            let kernel = kind.kernel();
            let out = FilterEngine::new()
                .apply_in_order(&input, kernel.as_ref(), reversed)
                .unwrap();
            assert_eq!(out, reference);
        }
    }

    #[test]
    fn test_zero_area_invokes_nothing() {
        for (w, h) in [(0, 0), (0, 4), (4, 0)] {
            for traversal in ALL_TRAVERSALS {
                let kernel = CountingKernel { calls: AtomicUsize::new(0) };
                let out = engine(traversal).apply(&PixelBuffer::new(w, h), &kernel).unwrap();
                assert_eq!((out.width(), out.height()), (w, h));
                assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
            }
        }
    }

    #[test]
    fn test_every_coordinate_evaluated_once() {
        let kernel = CountingKernel { calls: AtomicUsize::new(0) };
        FilterEngine::new().apply(&PixelBuffer::new(7, 5), &kernel).unwrap();
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 35);
    }

    #[test]
    fn test_state_and_pass_count() {
        let mut engine = FilterEngine::new();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.passes(), 0);

        engine.apply(&test_image(3, 3), &Grayscale).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.passes(), 1);
    }

    #[test]
    fn test_kernel_error_aborts_pass() {
        for traversal in ALL_TRAVERSALS {
            let mut engine = engine(traversal);
            let err = engine.apply(&test_image(4, 4), &FailAt(2, 3)).unwrap_err();
            assert!(matches!(err, FilterError::OutOfRange { .. }));
            assert_eq!(engine.state(), EngineState::Idle);
            assert_eq!(engine.passes(), 0);
        }
    }

    #[test]
    fn test_apply_in_order_validates_coverage() {
        let input = test_image(2, 2);
        let mut engine = FilterEngine::new();

        let err = engine
            .apply_in_order(&input, &Sepia::default(), vec![(0, 0), (1, 0), (0, 1)])
            .unwrap_err();
        assert_eq!(err, FilterError::DimensionMismatch { expected: 4, actual: 3 });

        let err = engine
            .apply_in_order(&input, &Sepia::default(), vec![(0, 0), (0, 0)])
            .unwrap_err();
        assert_eq!(err, FilterError::DimensionMismatch { expected: 4, actual: 2 });

        let err = engine
            .apply_in_order(&input, &Sepia::default(), vec![(2, 0)])
            .unwrap_err();
        assert_eq!(err, FilterError::OutOfRange { x: 2, y: 0, width: 2, height: 2 });

        assert_eq!(engine.passes(), 0);
    }

    #[test]
    fn test_options_from_json() {
        let options: EngineOptions = serde_json::from_str(r#"{"traversal": "column-major"}"#).unwrap();
        assert_eq!(options.traversal, Traversal::ColumnMajor);

        let options: EngineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.traversal, Traversal::Parallel);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_any_order_matches_row_major(
            order in Just(row_major(6, 5).collect::<Vec<_>>()).prop_shuffle(),
            kind_index in 0usize..3,
        ) {
            let input = test_image(6, 5);
            let kernel = FilterKind::ALL[kind_index].kernel();
            let expected = engine(Traversal::RowMajor).apply(&input, kernel.as_ref()).unwrap();
            let actual = FilterEngine::new().apply_in_order(&input, kernel.as_ref(), order).unwrap();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn prop_parallel_matches_row_major(
            data in proptest::collection::vec(any::<u8>(), 4 * 3 * 3),
            kind_index in 0usize..3,
        ) {
            let input = PixelBuffer::from_raw(4, 3, data).unwrap();
            let kind = FilterKind::ALL[kind_index];
            let expected = engine(Traversal::RowMajor).apply_kind(&input, kind).unwrap();
            let actual = engine(Traversal::Parallel).apply_kind(&input, kind).unwrap();
            prop_assert_eq!(actual, expected);
        }
    }
}
