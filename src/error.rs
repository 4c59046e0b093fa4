//! Error types shared by the filter engine and its callers.

/// Errors raised by pixel buffers and the filter engine.
///
/// Both variants indicate a caller defect. Neither is retried: the pass that
/// hit one is abandoned and no partial output is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A coordinate fell outside the buffer.
    #[error("coordinate ({x}, {y}) is outside a {width}x{height} buffer")]
    OutOfRange {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    /// Data length or traversal coverage does not match the buffer shape.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T, E = FilterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_values() {
        let err = FilterError::OutOfRange { x: -1, y: 4, width: 3, height: 2 };
        assert_eq!(err.to_string(), "coordinate (-1, 4) is outside a 3x2 buffer");

        let err = FilterError::DimensionMismatch { expected: 12, actual: 9 };
        assert_eq!(err.to_string(), "dimension mismatch: expected 12, got 9");
    }
}
