//! Intervention Scenarios
//!
//! An intervention is an ordered list of balanced scaling steps applied to a
//! food balance sheet, plus the indicators to report afterwards. Steps are
//! chained: each one sees the sheet produced by the previous step.
//!
//! # File Format
//!
//! Interventions are stored as YAML files:
//!
//! ```yaml
//! apiVersion: agrifood/v1
//! kind: Intervention
//!
//! metadata:
//!   name: halve_meat
//!   title: "Halve meat consumption"
//!   description: "Phase in a 50% cut of bovine and pig meat by 2030"
//!
//! steps:
//!   - origin: food
//!     scale: 0.5
//!     constant: false
//!     targets: [imports]
//!     # takes what imports cannot give up
//!     fallback: exports
//!     select:
//!       Item: [2731, 2733]
//!     adoption:
//!       curve: logistic
//!       start_year: 2020
//!       timescale: 10
//!
//! # Indicators reported by `agrifood-run compare`
//! metrics: [ssr, idr]
//! ```

mod types;


pub use types::*;
