//! Derived indicators
//!
//! Pure functions over a [`FoodBalanceSheet`]. None of them mutate the
//! sheet, and a cell without supply yields NaN rather than an error.

use agrifood_foundation::{Label, LabeledArray, Selection, dims};
use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::Result;
use crate::sheet::FoodBalanceSheet;

/// Named indicator, for configuration-driven reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Self-sufficiency ratio.
    Ssr,
    /// Import dependency ratio.
    Idr,
    /// Supply minus utilization.
    Residual,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Ssr => "ssr",
            Metric::Idr => "idr",
            Metric::Residual => "residual",
        }
    }

    /// Compute the indicator. `items` and `per_item` are ignored by
    /// [`Metric::Residual`], which is always per cell.
    pub fn compute(
        self,
        sheet: &FoodBalanceSheet,
        items: Option<&[Label]>,
        per_item: bool,
    ) -> Result<LabeledArray> {
        match self {
            Metric::Ssr => self_sufficiency_ratio(sheet, items, per_item),
            Metric::Idr => import_dependency_ratio(sheet, items, per_item),
            Metric::Residual => Ok(balance_residual(sheet)),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Share of domestic supply met by domestic production:
/// `production / (production + imports − exports)`.
///
/// With `per_item` the result keeps the sheet's axes. Otherwise numerator
/// and denominator are each summed over `Item` before dividing, so large
/// items weigh more than small ones. `items` restricts the computation to a
/// subset of items.
///
/// Unlike the sheet's totals, a NaN entry is not read as zero here: it makes
/// that item's supply NaN, which the aggregate then skips while the item's
/// numerator still counts. With `production = [50, 0]` and
/// `imports = [NaN, 50]` the aggregate is `50 / 50 = 1`, not `0.5`.
pub fn self_sufficiency_ratio(
    sheet: &FoodBalanceSheet,
    items: Option<&[Label]>,
    per_item: bool,
) -> Result<LabeledArray> {
    supply_ratio(sheet, Element::Production, items, per_item)
}

/// Share of domestic supply met by imports:
/// `imports / (production + imports − exports)`.
///
/// Same aggregation rules as [`self_sufficiency_ratio`].
pub fn import_dependency_ratio(
    sheet: &FoodBalanceSheet,
    items: Option<&[Label]>,
    per_item: bool,
) -> Result<LabeledArray> {
    supply_ratio(sheet, Element::Imports, items, per_item)
}

/// Supply minus utilization per cell; zero where the sheet is balanced.
pub fn balance_residual(sheet: &FoodBalanceSheet) -> LabeledArray {
    sheet.imbalance()
}

fn supply_ratio(
    sheet: &FoodBalanceSheet,
    numerator: Element,
    items: Option<&[Label]>,
    per_item: bool,
) -> Result<LabeledArray> {
    let production = sheet.element(Element::Production)?;
    let imports = sheet.element(Element::Imports)?;
    let exports = sheet.element(Element::Exports)?;
    let mut numerator = sheet.element(numerator)?.clone();

    let mut supply = production.zip_with(imports, |p, i| p + i)?;
    supply = supply.zip_with(exports, |s, e| s - e)?;

    if let Some(items) = items {
        let selection = Selection::all().with(dims::ITEM, items);
        numerator = numerator.select(&selection)?;
        supply = supply.select(&selection)?;
    }
    if !per_item {
        numerator = numerator.sum_over(dims::ITEM)?;
        supply = supply.sum_over(dims::ITEM)?;
    }

    Ok(numerator.zip_with(&supply, |n, d| if d == 0.0 { f64::NAN } else { n / d })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrifood_foundation::labels;

    fn sheet(production: Vec<f64>, imports: Vec<f64>, exports: Vec<f64>) -> FoodBalanceSheet {
        let items: Vec<i64> = (1..=production.len() as i64).collect();
        let data = [production, imports, exports].concat();
        FoodBalanceSheet::from_wide(
            &[Element::Production, Element::Imports, Element::Exports],
            labels(items),
            vec![2020],
            None,
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_ssr_aggregates_before_dividing() {
        let sheet = sheet(vec![100.0, 0.0], vec![0.0, 10.0], vec![0.0, 0.0]);

        let aggregate = self_sufficiency_ratio(&sheet, None, false).unwrap();
        assert_eq!(aggregate.dims(), ["Year"]);
        assert!((aggregate.data()[0] - 100.0 / 110.0).abs() < 1e-12);

        let per_item = self_sufficiency_ratio(&sheet, None, true).unwrap();
        assert_eq!(per_item.data(), &[1.0, 0.0]);
        let mean = per_item.total() / per_item.len() as f64;
        assert_eq!(mean, 0.5);
    }

    #[test]
    fn test_ssr_zero_supply_is_nan() {
        let sheet = sheet(vec![0.0, 5.0], vec![0.0, 5.0], vec![0.0, 0.0]);
        let ssr = self_sufficiency_ratio(&sheet, None, true).unwrap();
        assert!(ssr.data()[0].is_nan());
        assert_eq!(ssr.data()[1], 0.5);
    }

    #[test]
    fn test_ssr_item_subset() {
        let sheet = sheet(vec![100.0, 0.0], vec![0.0, 10.0], vec![0.0, 0.0]);
        let ssr = self_sufficiency_ratio(&sheet, Some(labels([2]).as_slice()), false).unwrap();
        assert_eq!(ssr.data(), &[0.0]);

        let err = self_sufficiency_ratio(&sheet, Some(labels([99]).as_slice()), false).unwrap_err();
        assert!(matches!(err, crate::Error::SelectionEmpty { .. }));
    }

    #[test]
    fn test_aggregate_skips_items_without_supply() {
        let sheet = sheet(vec![50.0, 0.0], vec![f64::NAN, 50.0], vec![0.0, 0.0]);
        let ssr = self_sufficiency_ratio(&sheet, None, false).unwrap();
        assert_eq!(ssr.data(), &[1.0]);
    }

    #[test]
    fn test_idr_counts_exports() {
        let sheet = sheet(vec![50.0], vec![100.0], vec![50.0]);
        let idr = import_dependency_ratio(&sheet, None, true).unwrap();
        assert_eq!(idr.data(), &[1.0]);
    }

    #[test]
    fn test_missing_element() {
        let sheet = FoodBalanceSheet::from_wide(
            &[Element::Production, Element::Imports],
            labels([1]),
            vec![2020],
            None,
            vec![1.0, 1.0],
        )
        .unwrap();
        assert_eq!(
            Metric::Ssr.compute(&sheet, None, false).unwrap_err(),
            crate::Error::MissingElement(Element::Exports)
        );
    }

    #[test]
    fn test_residual_metric() {
        let sheet = sheet(vec![10.0], vec![0.0], vec![0.0])
            .with_element(
                Element::Food,
                LabeledArray::new(
                    vec![
                        agrifood_foundation::Axis::new("Item", [1]).unwrap(),
                        agrifood_foundation::Axis::new("Year", [2020]).unwrap(),
                    ],
                    vec![7.0],
                )
                .unwrap(),
            )
            .unwrap();
        let residual = Metric::Residual.compute(&sheet, None, false).unwrap();
        assert_eq!(residual.data(), &[3.0]);
    }
}
