//! Filter scripts: a small expression language for writing per-pixel
//! filters by hand.
//!
//! ## Language
//!
//! ```text
//! # comment
//! makeRef();
//! for (x = 0; x < width; x = x + 1) {
//!     for (y = 0; y < height; y = y + 1) {
//!         loadRef(x, y);
//!         pixels[x, y] = rgb(255 - r, 255 - g, 255 - b);
//!     };
//! };
//! ```
//!
//! Everything is an expression. Available globals:
//!
//! | Name | Meaning |
//! |------|---------|
//! | `width`, `height` | image dimensions |
//! | `pixels[x, y]` | working image; assign a color to write, index to read |
//! | `loadColor(x, y)` | set `r`, `g`, `b` from the working image |
//! | `makeRef()` | snapshot the working image |
//! | `loadRef(x, y)` | set `r`, `g`, `b` from the snapshot |
//! | `rgb(r, g, b)` | build a color, truncating each channel toward zero |
//! | `sqrt(v)` | square root |
//!
//! Writes go straight into the image, so a script that samples neighbors
//! must read them from the snapshot. [`presets`] holds the three built-in
//! filters written this way.

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::filters::PixelBuffer;

pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod presets;

use self::interpreter::Interpreter;
use self::parser::Expr;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("syntax error at {line}:{col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("undefined variable \"{0}\"")]
    UndefinedVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("domain error: {0}")]
    Domain(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{name} takes {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("a {0} is not callable")]
    NotCallable(String),

    #[error("loadRef called before makeRef")]
    MissingReference,

    #[error("script exceeded {0} evaluation steps")]
    StepLimitExceeded(u64),

    #[error("script exceeded call depth {0}")]
    RecursionLimit(usize),

    #[error("script nested deeper than {0} levels")]
    NestingLimit(usize),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

// ============================================================================
// Limits
// ============================================================================

/// Bounds on how much work a single script run may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Expression evaluations before the run is aborted.
    pub max_steps: u64,
    /// Nested lambda calls before the run is aborted.
    pub max_call_depth: usize,
    /// Deepest expression the parser accepts, and the deepest the evaluator
    /// will recurse counting every active lambda call's frames.
    pub max_nesting: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_steps: 100_000_000,
            max_call_depth: 128,
            max_nesting: 256,
        }
    }
}

// ============================================================================
// Script
// ============================================================================

/// A parsed script, reusable across images.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    program: Expr,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        Self::parse_with_limits(source, ScriptLimits::default())
    }

    /// Parse, rejecting expressions nested deeper than `limits.max_nesting`.
    pub fn parse_with_limits(source: &str, limits: ScriptLimits) -> Result<Self, ScriptError> {
        Ok(Self {
            program: parser::parse(source, limits.max_nesting)?,
        })
    }

    pub fn program(&self) -> &Expr {
        &self.program
    }

    /// Run against `image`, returning it once the script completes.
    ///
    /// On error the partially edited image is dropped.
    pub fn run(&self, mut image: PixelBuffer, limits: ScriptLimits) -> Result<PixelBuffer, ScriptError> {
        log::debug!(
            "script run start: size={}x{} max_steps={}",
            image.width(),
            image.height(),
            limits.max_steps
        );
        let steps = {
            let mut interpreter = Interpreter::new(&mut image, limits);
            interpreter.run(&self.program)?;
            interpreter.steps()
        };
        log::debug!("script run done: steps={}", steps);
        Ok(image)
    }
}

/// Parse and run `source` against `image` in one go.
pub fn run_script(image: PixelBuffer, source: &str, limits: ScriptLimits) -> Result<PixelBuffer, ScriptError> {
    Script::parse_with_limits(source, limits)?.run(image, limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Color;

    #[test]
    fn test_run_script_inverts() {
        let image = PixelBuffer::filled(3, 2, Color::new(10, 20, 30));
        let source = "
            for (x = 0; x < width; x = x + 1) {
                for (y = 0; y < height; y = y + 1) {
                    loadColor(x, y);
                    pixels[x, y] = rgb(255 - r, 255 - g, 255 - b);
                };
            };
        ";
        let out = run_script(image, source, ScriptLimits::default()).unwrap();
        assert_eq!(out, PixelBuffer::filled(3, 2, Color::new(245, 235, 225)));
    }

    #[test]
    fn test_script_reused_across_images() {
        let script = Script::parse("pixels[0, 0] = rgb(width, height, 0)").unwrap();
        let a = script.run(PixelBuffer::new(4, 2), ScriptLimits::default()).unwrap();
        let b = script.run(PixelBuffer::new(7, 1), ScriptLimits::default()).unwrap();
        assert_eq!(a.get(0, 0), Ok(Color::new(4, 2, 0)));
        assert_eq!(b.get(0, 0), Ok(Color::new(7, 1, 0)));
    }

    #[test]
    fn test_errors_display() {
        let err = Script::parse("x = ;").unwrap_err();
        assert_eq!(err.to_string(), "syntax error at 1:5: unexpected \";\"");

        let err = run_script(PixelBuffer::new(1, 1), "pixels[1, 0] = rgb(0, 0, 0)", ScriptLimits::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "coordinate (1, 0) is outside a 1x1 buffer");
    }

    #[test]
    fn test_limits_from_json() {
        let limits: ScriptLimits = serde_json::from_str(r#"{"max_steps": 50}"#).unwrap();
        assert_eq!(limits.max_steps, 50);
        assert_eq!(limits.max_call_depth, ScriptLimits::default().max_call_depth);
        assert_eq!(limits.max_nesting, ScriptLimits::default().max_nesting);
    }

    #[test]
    fn test_long_sum_runs() {
        let sum = vec!["1"; 50_000].join(" + ");
        let source = format!("pixels[0, 0] = rgb(({sum}) // 200, 0, 0)");
        let out = run_script(PixelBuffer::new(1, 1), &source, ScriptLimits::default()).unwrap();
        assert_eq!(out.get(0, 0), Ok(Color::new(250, 0, 0)));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let source = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = run_script(PixelBuffer::new(1, 1), &source, ScriptLimits::default()).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }), "got {err:?}");

        let limits = ScriptLimits { max_nesting: 4, ..ScriptLimits::default() };
        assert!(Script::parse_with_limits("((((1))))", limits).is_err());
        assert!(Script::parse_with_limits("(1)", limits).is_ok());
    }
}
