//! Labeled array errors

use thiserror::Error;

use crate::Label;

/// Result type for labeled array operations
pub type Result<T> = std::result::Result<T, ArrayError>;

/// Labeled array errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrayError {
    #[error("unknown axis: {0}")]
    UnknownAxis(String),

    #[error("label {label} not found on axis {axis}")]
    UnknownLabel { axis: String, label: Label },

    #[error("duplicate axis: {0}")]
    DuplicateAxis(String),

    #[error("duplicate label {label} on axis {axis}")]
    DuplicateLabel { axis: String, label: Label },

    #[error("data length {actual} does not match shape {shape:?} ({expected} cells)")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("axes do not match: {left:?} vs {right:?}")]
    AxisMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("cannot broadcast onto axis {axis}: label {label} has no counterpart")]
    Misaligned { axis: String, label: Label },

    #[error("selection matches nothing on axis {axis} (unmatched labels: {missing:?})")]
    EmptySelection { axis: String, missing: Vec<Label> },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
