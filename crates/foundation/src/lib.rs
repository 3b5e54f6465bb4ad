//! Agrifood Foundation
//!
//! Named-axis labeled arrays used as the storage layer beneath food balance
//! sheets: axis → label → index lookup, label-aligned broadcasting, partial
//! selections and NaN-skipping reductions.

pub mod array;
pub mod axis;
pub mod error;
pub mod label;
pub mod selection;

pub use array::{Fill, LabeledArray};
pub use axis::Axis;
pub use error::{ArrayError, Result};
pub use label::{Label, labels};
pub use selection::Selection;

/// Conventional axis names.
pub mod dims {
    pub const ITEM: &str = "Item";
    pub const REGION: &str = "Region";
    pub const YEAR: &str = "Year";
}
