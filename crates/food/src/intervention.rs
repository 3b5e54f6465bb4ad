//! Balanced scaling
//!
//! Scales one element over a selection and moves the resulting change onto
//! other elements so that
//! `Σ supply coef·value = Σ utilization value` still holds in every cell.
//!
//! Two policies:
//!
//! - **constant**: the origin's side total is held fixed. Compensating
//!   elements on the same side absorb the change (halving production raises
//!   imports by the same amount).
//! - **propagate**: the change flows to the opposite side, split across its
//!   elements in proportion to their current magnitude (halving food lowers
//!   production and imports pro rata).
//!
//! A compensator that would drop below zero makes the call fail, unless a
//! `fallback` element is named: the compensator then stops at zero and the
//! shortfall is routed to the fallback instead.
//!
//! Cells outside the selection are never written.

use agrifood_foundation::{LabeledArray, Selection};
use tracing::{debug, instrument, trace};

use crate::element::{Element, Side};
use crate::error::{Error, Infeasibility, Result};
use crate::scale::Scale;
use crate::sheet::{FoodBalanceSheet, NanToZero};

/// Negative results within this distance of zero, relative to the change
/// that produced them, are rounding noise and are stored as zero.
const ROUNDING: f64 = 1e-9;

/// Parameters of one balanced scaling intervention
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedScaling {
    /// Cells to scale; unrestricted by default.
    pub selection: Selection,
    /// Element whose selected values are multiplied by `scale`.
    pub origin: Element,
    /// Elements absorbing the change. Empty means the origin's default
    /// compensator (constant) or every element present on the opposite side
    /// (propagate).
    pub targets: Vec<Element>,
    pub scale: Scale,
    /// Hold the origin's side total constant instead of propagating.
    pub constant: bool,
    /// Takes whatever a compensator cannot absorb without going negative.
    pub fallback: Option<Element>,
}

impl BalancedScaling {
    pub fn new(origin: Element, scale: impl Into<Scale>) -> Self {
        Self {
            selection: Selection::all(),
            origin,
            targets: Vec::new(),
            scale: scale.into(),
            constant: false,
            fallback: None,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_target(mut self, target: Element) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Element>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }

    pub fn with_fallback(mut self, fallback: Element) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Side of the identity whose elements absorb the change.
    pub fn target_side(&self) -> Option<Side> {
        if self.constant {
            Some(self.origin.side()).filter(|side| *side != Side::Derived)
        } else {
            self.origin.side().opposite()
        }
    }

    /// Targets after applying defaults and checking them against the sheet.
    pub fn resolve_targets(&self, sheet: &FoodBalanceSheet) -> Result<Vec<Element>> {
        let origin = self.origin;
        let Some(side) = self.target_side() else {
            return Err(no_target(origin, "derived elements cannot be scaled"));
        };

        let targets: Vec<Element> = if self.targets.is_empty() {
            if self.constant {
                origin.default_compensator().into_iter().collect()
            } else {
                sheet.side_elements(side)
            }
        } else {
            let mut targets: Vec<Element> = Vec::with_capacity(self.targets.len());
            for &target in &self.targets {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            targets
        };

        if targets.is_empty() {
            return Err(no_target(origin, format!("no {side} elements in the sheet")));
        }
        for &target in &targets {
            if target == origin {
                return Err(no_target(origin, "an element cannot compensate itself"));
            }
            if target.side() != side {
                return Err(no_target(
                    origin,
                    format!("{target} is not a {side} element"),
                ));
            }
            sheet.element(target)?;
        }
        Ok(targets)
    }

    /// Fallback element, checked against the resolved targets and the sheet.
    ///
    /// It must sit on the targets' side and be neither the origin nor one of
    /// the targets.
    pub fn resolve_fallback(
        &self,
        sheet: &FoodBalanceSheet,
        targets: &[Element],
    ) -> Result<Option<Element>> {
        let Some(fallback) = self.fallback else {
            return Ok(None);
        };
        let origin = self.origin;
        if fallback == origin || targets.contains(&fallback) {
            return Err(no_target(
                origin,
                format!("fallback {fallback} is already scaled or compensating"),
            ));
        }
        if Some(fallback.side()) != self.target_side() {
            return Err(no_target(
                origin,
                format!("fallback {fallback} is on the wrong side"),
            ));
        }
        sheet.element(fallback)?;
        Ok(Some(fallback))
    }
}

fn negative(element: Element, cell: String, value: f64) -> Error {
    Error::InfeasibleScaling(Infeasibility::NegativeResult {
        element,
        cell,
        value,
    })
}

fn no_target(origin: Element, reason: impl Into<String>) -> Error {
    Error::InfeasibleScaling(Infeasibility::NoTarget {
        origin,
        reason: reason.into(),
    })
}

/// Scale `params.origin` over `params.selection` and rebalance the sheet.
///
/// Returns a new sheet; the input is untouched. Fails without a partial
/// result when a non-negative element (the fallback included) would go
/// negative or no target can take the change. A `domestic_supply` element,
/// if present, is refreshed in every changed cell.
#[instrument(skip_all, fields(origin = %params.origin, constant = params.constant))]
pub fn balanced_scaling(
    sheet: &FoodBalanceSheet,
    params: &BalancedScaling,
) -> Result<FoodBalanceSheet> {
    let origin = params.origin;
    let targets = params.resolve_targets(sheet)?;
    let fallback = params.resolve_fallback(sheet, &targets)?;
    let source = sheet.element(origin)?;
    let factors = params.scale.factors(source)?;
    let mask = source.selection_mask(&params.selection)?;

    let mut scaled = source.clone();
    let mut compensators: Vec<(Element, LabeledArray)> = targets
        .iter()
        .map(|&target| Ok((target, sheet.element(target)?.clone())))
        .collect::<Result<_>>()?;
    let mut fallback = fallback
        .map(|element| sheet.element(element).map(|array| (element, array.clone())))
        .transpose()?;

    // constant: the side total must not move; propagate: the other side follows.
    let sign = if params.constant { -1.0 } else { 1.0 };
    let origin_coef = origin.coefficient();
    let mut weights = vec![0.0; targets.len()];
    let mut touched: Vec<usize> = Vec::new();

    let origin_data = scaled.data_mut();
    for flat in mask.iter().enumerate().filter(|(_, m)| **m).map(|(f, _)| f) {
        let old = origin_data[flat];
        if old.is_nan() {
            continue;
        }
        let new = old * factors[flat];
        let delta = new - old;
        origin_data[flat] = new;
        if delta == 0.0 {
            continue;
        }
        touched.push(flat);

        for (weight, (_, array)) in weights.iter_mut().zip(&compensators) {
            *weight = array.data()[flat].nan_to_zero().abs();
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        } else if params.constant {
            let share = 1.0 / weights.len() as f64;
            weights.fill(share);
        } else {
            return Err(Error::InfeasibleScaling(Infeasibility::ZeroWeights {
                cell: sheet.describe_cell(flat),
            }));
        }

        // shortfall in the fallback's own units
        let mut shortfall = 0.0;
        for ((element, array), &weight) in compensators.iter_mut().zip(&weights) {
            if weight == 0.0 {
                continue;
            }
            let change = sign * origin_coef * delta * weight / element.coefficient();
            let data = array.data_mut();
            let mut value = data[flat].nan_to_zero() + change;
            if value < 0.0 && !element.is_signed() {
                if value < -ROUNDING * change.abs() {
                    let Some((target, _)) = &fallback else {
                        return Err(negative(*element, sheet.describe_cell(flat), value));
                    };
                    shortfall += value * element.coefficient() / target.coefficient();
                }
                value = 0.0;
            }
            trace!(flat, %element, change, value, "compensated");
            data[flat] = value;
        }

        if let Some((element, array)) = fallback.as_mut().filter(|_| shortfall != 0.0) {
            let data = array.data_mut();
            let mut value = data[flat].nan_to_zero() + shortfall;
            if value < 0.0 && !element.is_signed() {
                if value < -ROUNDING * shortfall.abs() {
                    return Err(negative(*element, sheet.describe_cell(flat), value));
                }
                value = 0.0;
            }
            trace!(flat, %element, shortfall, value, "fallback");
            data[flat] = value;
        }
    }

    let mut out = sheet.with_element(origin, scaled)?;
    for (element, array) in compensators.into_iter().chain(fallback) {
        out = out.with_element(element, array)?;
    }
    if let Some(stored) = sheet.get(Element::DomesticSupply) {
        let supply = out.supply_total();
        let mut refreshed = stored.clone();
        let data = refreshed.data_mut();
        for &flat in &touched {
            data[flat] = supply.data()[flat];
        }
        out = out.with_element(Element::DomesticSupply, refreshed)?;
    }

    debug!(
        targets = ?targets,
        cells = touched.len(),
        "balanced scaling applied"
    );
    Ok(out)
}
