//! Agrifood Food
//!
//! Food balance sheets, the indicators derived from them, and balanced
//! scaling interventions that keep supply equal to utilization.

pub mod batch;
pub mod element;
pub mod error;
pub mod intervention;
pub mod metrics;
pub mod scale;
pub mod scenario;
pub mod sheet;

pub use batch::{Outcome, compare};
pub use element::{Element, Side};
pub use error::{Error, Infeasibility, Result};
pub use intervention::{BalancedScaling, balanced_scaling};
pub use metrics::{Metric, balance_residual, import_dependency_ratio, self_sufficiency_ratio};
pub use scale::{Adoption, Curve, Scale, linear_scale, logistic_scale};
pub use scenario::{Intervention, ScenarioError, Step};
pub use sheet::{FoodBalanceSheet, Projection, Record};
