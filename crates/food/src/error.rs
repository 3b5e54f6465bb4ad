//! Food balance sheet errors

use agrifood_foundation::{ArrayError, Label};
use thiserror::Error;

use crate::element::Element;

/// Result type for food balance sheet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Food balance sheet errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("missing element: {0}")]
    MissingElement(Element),

    #[error("invalid scale factor {value}: must be finite and non-negative")]
    InvalidScale { value: f64 },

    #[error("invalid adoption curve: {0}")]
    InvalidAdoption(String),

    #[error("infeasible scaling: {0}")]
    InfeasibleScaling(Infeasibility),

    #[error("selection matches nothing on axis {axis} (unmatched labels: {missing:?})")]
    SelectionEmpty { axis: String, missing: Vec<Label> },

    #[error("invalid food balance sheet: {0}")]
    InvalidSheet(String),

    #[error("unbalanced at {cell}: supply {supply} != utilization {utilization}")]
    Unbalanced {
        cell: String,
        supply: f64,
        utilization: f64,
    },

    #[error(transparent)]
    Array(ArrayError),
}

/// Why a redistribution cannot be carried out
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Infeasibility {
    #[error("{element} would become {value} at {cell}")]
    NegativeResult {
        element: Element,
        cell: String,
        value: f64,
    },

    #[error("no valid target for {origin}: {reason}")]
    NoTarget { origin: Element, reason: String },

    #[error("all propagation targets are zero at {cell}")]
    ZeroWeights { cell: String },
}

impl From<ArrayError> for Error {
    fn from(err: ArrayError) -> Self {
        match err {
            ArrayError::EmptySelection { axis, missing } => Error::SelectionEmpty { axis, missing },
            other => Error::Array(other),
        }
    }
}
