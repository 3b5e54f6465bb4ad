//! Scale factors and adoption curves
//!
//! An intervention's scale is either one multiplier for every cell or a
//! labeled array broadcast onto the sheet, typically a `Year` curve that
//! phases the intervention in over time.

use agrifood_foundation::{Axis, LabeledArray, dims};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Multiplier applied to selected cells
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Uniform(f64),
    /// Per-label factors aligned by label onto the sheet's axes.
    Array(LabeledArray),
}

impl From<f64> for Scale {
    fn from(value: f64) -> Self {
        Scale::Uniform(value)
    }
}

impl From<LabeledArray> for Scale {
    fn from(array: LabeledArray) -> Self {
        Scale::Array(array)
    }
}

fn check_factor(value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidScale { value })
    }
}

impl Scale {
    /// Reject negative or non-finite factors.
    pub fn validate(&self) -> Result<()> {
        match self {
            Scale::Uniform(value) => check_factor(*value),
            Scale::Array(array) => array.data().iter().try_for_each(|&v| check_factor(v)),
        }
    }

    /// One factor per cell of `template`, in its storage order.
    pub fn factors(&self, template: &LabeledArray) -> Result<Vec<f64>> {
        self.validate()?;
        match self {
            Scale::Uniform(value) => Ok(vec![*value; template.len()]),
            Scale::Array(array) => {
                let aligned = template.broadcast_with(array, |_, factor| factor)?;
                Ok(aligned.data().to_vec())
            }
        }
    }
}

/// Shape of an adoption curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// Slow-fast-slow adoption.
    #[default]
    Logistic,
    /// Constant-slope adoption.
    Linear,
}

fn default_timescale() -> i64 {
    10
}

/// Time-phased adoption of an intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adoption {
    #[serde(default)]
    pub curve: Curve,

    /// First year of the transition; defaults to the sheet's first year.
    #[serde(default)]
    pub start_year: Option<i64>,

    /// Years until full adoption.
    #[serde(default = "default_timescale")]
    pub timescale: i64,
}

impl Default for Adoption {
    fn default() -> Self {
        Self {
            curve: Curve::default(),
            start_year: None,
            timescale: default_timescale(),
        }
    }
}

impl Adoption {
    /// Scale going from 1 (no change) to `target` over the given years.
    pub fn scale_for(&self, years: &Axis, target: f64) -> Result<Scale> {
        let values: Vec<i64> = years
            .labels()
            .map(|label| {
                label.as_int().ok_or_else(|| {
                    Error::InvalidSheet(format!("non-integer year label: {label}"))
                })
            })
            .collect::<Result<_>>()?;
        let (Some(&first), Some(&last)) = (values.iter().min(), values.iter().max()) else {
            return Err(Error::InvalidSheet("empty Year axis".to_string()));
        };
        if self.timescale < 0 {
            return Err(Error::InvalidAdoption(format!(
                "negative timescale {}",
                self.timescale
            )));
        }

        let start = self.start_year.unwrap_or(first);
        let end = start.checked_add(self.timescale).ok_or_else(|| {
            Error::InvalidAdoption(format!(
                "start year {start} + timescale {} is out of range",
                self.timescale
            ))
        })?;
        let curve = match self.curve {
            Curve::Logistic => logistic_scale(first, start, end, last, 1.0, target)?,
            Curve::Linear => linear_scale(first, start, end, last, 1.0, target)?,
        };
        Ok(Scale::Array(curve))
    }
}

fn year_curve(y0: i64, y3: i64, value: impl Fn(i64) -> f64) -> Result<LabeledArray> {
    let years: Vec<i64> = (y0..=y3).collect();
    let data = years.iter().map(|&y| value(y)).collect();
    Ok(LabeledArray::new(vec![Axis::new(dims::YEAR, years)?], data)?)
}

/// Year array with a logistic transition.
///
/// Constant `c_init` over `[y0, y1)`, a logistic step
/// `c_init + (c_end - c_init) / (1 + exp(-10 (t - 0.5)))` with
/// `t = (y - y1) / (y2 - y1)` over `[y1, y2)`, and constant `c_end` over
/// `[y2, y3]`.
pub fn logistic_scale(
    y0: i64,
    y1: i64,
    y2: i64,
    y3: i64,
    c_init: f64,
    c_end: f64,
) -> Result<LabeledArray> {
    year_curve(y0, y3, |y| {
        if y >= y2 {
            c_end
        } else if y >= y1 {
            let t = (y - y1) as f64 / (y2 - y1) as f64;
            c_init + (c_end - c_init) / (1.0 + (-10.0 * (t - 0.5)).exp())
        } else {
            c_init
        }
    })
}

/// Year array with a linear transition.
///
/// Same segments as [`logistic_scale`] with a straight line between `y1`
/// and `y2`. `y1 == y2` gives an instantaneous change.
pub fn linear_scale(
    y0: i64,
    y1: i64,
    y2: i64,
    y3: i64,
    c_init: f64,
    c_end: f64,
) -> Result<LabeledArray> {
    let slope = if y2 == y1 {
        c_end - c_init
    } else {
        (c_end - c_init) / (y2 - y1) as f64
    };
    year_curve(y0, y3, |y| {
        if y >= y2 {
            c_end
        } else if y >= y1 {
            slope * (y - y1) as f64 + c_init
        } else {
            c_init
        }
    })
}
