//! WebAssembly exports for pixelscript.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. All of them
//! take and return flat RGBA bytes (length = width * height * 4), the layout
//! of a canvas `ImageData`. Alpha passes through untouched.

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::filters::{FilterEngine, FilterKind, PixelBuffer};
use crate::script::{self, ScriptLimits};

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Split flat RGBA bytes into a pixel buffer and its alpha plane.
fn unpack(data: &[u8], width: usize, height: usize) -> Result<(PixelBuffer, Option<ndarray::Array2<u8>>), JsValue> {
    let input = Array3::from_shape_vec((height, width, 4), data.to_vec()).map_err(js_error)?;
    PixelBuffer::from_channels(input.view()).map_err(js_error)
}

fn pack(buffer: PixelBuffer, alpha: Option<ndarray::Array2<u8>>) -> Result<Vec<u8>, JsValue> {
    let output = buffer.into_channels(alpha).map_err(js_error)?;
    Ok(output.into_raw_vec_and_offset().0)
}

// ============================================================================
// Built-in Filters
// ============================================================================

/// Apply a built-in filter by name.
///
/// # Arguments
/// * `data` - Flat array of RGBA bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `name` - "grayscale", "sepia" or "edge-detect"
///
/// # Returns
/// Flat array of RGBA bytes
#[wasm_bindgen]
pub fn apply_filter_wasm(data: &[u8], width: usize, height: usize, name: &str) -> Result<Vec<u8>, JsValue> {
    let kind: FilterKind = name.parse().map_err(js_error)?;
    let (buffer, alpha) = unpack(data, width, height)?;
    let result = FilterEngine::new().apply_kind(&buffer, kind).map_err(js_error)?;
    pack(result, alpha)
}

// ============================================================================
// Filter Scripts
// ============================================================================

/// Run a filter script against an image.
///
/// # Returns
/// Flat array of RGBA bytes, or the script error message
#[wasm_bindgen]
pub fn run_script_wasm(data: &[u8], width: usize, height: usize, source: &str) -> Result<Vec<u8>, JsValue> {
    let (buffer, alpha) = unpack(data, width, height)?;
    let result = script::run_script(buffer, source, ScriptLimits::default()).map_err(js_error)?;
    pack(result, alpha)
}

/// Script source for a built-in filter.
#[wasm_bindgen]
pub fn preset_script_wasm(name: &str) -> Result<String, JsValue> {
    let kind: FilterKind = name.parse().map_err(js_error)?;
    Ok(script::presets::for_kind(kind).to_string())
}
