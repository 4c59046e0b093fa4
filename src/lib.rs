//! pixelscript
//!
//! Per-pixel image filters (grayscale, sepia, Sobel edge detection) run by a
//! small filter engine, plus a scripting language for writing such filters
//! by hand. Python bindings via PyO3 and WASM bindings for JavaScript are
//! available behind the `python` and `wasm` features.
//!
//! ## Image Format
//! Buffers are `(height, width, 3)` RGB `u8` arrays. The bindings also
//! accept RGBA input: alpha is split off before filtering and reattached
//! unchanged afterwards.
//!
//! ## Layout
//! - [`filters`]: pixel buffers, kernels and the [`FilterEngine`]
//! - [`script`]: lexer, parser and interpreter for filter scripts
//! - [`error`]: buffer and engine errors

pub mod error;
pub mod filters;
pub mod script;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::FilterError;
pub use filters::{Color, FilterEngine, FilterKind, PixelBuffer};
pub use script::{run_script, Script, ScriptError, ScriptLimits};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::filters::{FilterEngine, FilterKind, PixelBuffer};
    use crate::script::{self, ScriptLimits};

    fn value_error(err: impl std::fmt::Display) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    // ========================================================================
    // Built-in Filters
    // ========================================================================

    /// Apply a built-in filter by name.
    ///
    /// # Arguments
    /// * `image` - Input image (3 or 4 channels, u8)
    /// * `name` - "grayscale", "sepia" or "edge-detect"
    ///
    /// # Returns
    /// Filtered image with the input's shape. Alpha is preserved.
    #[pyfunction]
    pub fn apply_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        name: &str,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let kind: FilterKind = name.parse().map_err(value_error)?;
        let (buffer, alpha) = PixelBuffer::from_channels(image.as_array()).map_err(value_error)?;
        let result = py
            .allow_threads(|| FilterEngine::new().apply_kind(&buffer, kind))
            .map_err(value_error)?;
        let output = result.into_channels(alpha).map_err(value_error)?;
        Ok(output.into_pyarray(py))
    }

    // ========================================================================
    // Filter Scripts
    // ========================================================================

    /// Run a filter script against an image.
    ///
    /// # Arguments
    /// * `image` - Input image (3 or 4 channels, u8)
    /// * `source` - Script source
    /// * `max_steps` - Evaluation budget before the script is aborted
    #[pyfunction]
    #[pyo3(signature = (image, source, max_steps=None))]
    pub fn run_script<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        source: &str,
        max_steps: Option<u64>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let mut limits = ScriptLimits::default();
        if let Some(max_steps) = max_steps {
            limits.max_steps = max_steps;
        }
        let (buffer, alpha) = PixelBuffer::from_channels(image.as_array()).map_err(value_error)?;
        let result = script::run_script(buffer, source, limits).map_err(value_error)?;
        let output = result.into_channels(alpha).map_err(value_error)?;
        Ok(output.into_pyarray(py))
    }

    /// Script source for a built-in filter, for use as a starting point.
    #[pyfunction]
    pub fn preset_script(name: &str) -> PyResult<&'static str> {
        let kind: FilterKind = name.parse().map_err(value_error)?;
        Ok(script::presets::for_kind(kind))
    }

    /// Python module definition
    #[pymodule]
    pub fn pixelscript(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(apply_filter, m)?)?;
        m.add_function(wrap_pyfunction!(run_script, m)?)?;
        m.add_function(wrap_pyfunction!(preset_script, m)?)?;
        Ok(())
    }
}
