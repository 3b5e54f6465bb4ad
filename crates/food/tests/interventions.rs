//! End-to-end checks of balanced scaling and the supply ratios on small,
//! hand-computed balance sheets.

use agrifood_food::{
    BalancedScaling, Element, Error, FoodBalanceSheet, Infeasibility, Record, Scale,
    balanced_scaling, logistic_scale, self_sufficiency_ratio,
};
use agrifood_foundation::{Label, Selection, labels};

fn record(element: Element, item: i64, region: &str, year: i64, value: f64) -> Record {
    Record {
        element,
        item: Label::Int(item),
        year,
        region: Some(Label::from(region)),
        value,
    }
}

/// One item, one region, one year:
/// `production=100, imports=20, exports=0, food=110, feed=10`.
fn single_cell() -> FoodBalanceSheet {
    FoodBalanceSheet::from_long(&[
        record(Element::Production, 2731, "UK", 2020, 100.0),
        record(Element::Imports, 2731, "UK", 2020, 20.0),
        record(Element::Exports, 2731, "UK", 2020, 0.0),
        record(Element::Food, 2731, "UK", 2020, 110.0),
        record(Element::Feed, 2731, "UK", 2020, 10.0),
    ])
    .unwrap()
}

/// Two items, two regions, three years, all balanced.
fn panel() -> FoodBalanceSheet {
    let mut records = Vec::new();
    for (item, base) in [(2731, 100.0), (2511, 400.0)] {
        for (region, factor) in [("UK", 1.0), ("FR", 1.5)] {
            for (offset, year) in (2020..=2022).enumerate() {
                let production = base * factor + 10.0 * offset as f64;
                let imports = 0.2 * production;
                let exports = 0.05 * production;
                let supply = production + imports - exports;
                records.extend([
                    record(Element::Production, item, region, year, production),
                    record(Element::Imports, item, region, year, imports),
                    record(Element::Exports, item, region, year, exports),
                    record(Element::Food, item, region, year, 0.7 * supply),
                    record(Element::Feed, item, region, year, 0.2 * supply),
                    record(Element::Losses, item, region, year, 0.1 * supply),
                ]);
            }
        }
    }
    FoodBalanceSheet::from_long(&records).unwrap()
}

fn value(sheet: &FoodBalanceSheet, element: Element) -> f64 {
    sheet.element(element).unwrap().data()[0]
}

#[test]
fn test_constant_scaling_moves_delta_into_imports() {
    let sheet = single_cell();
    let params = BalancedScaling::new(Element::Production, 0.5)
        .with_constant(true)
        .with_target(Element::Imports);
    let out = balanced_scaling(&sheet, &params).unwrap();

    assert_eq!(value(&out, Element::Production), 50.0);
    assert_eq!(value(&out, Element::Imports), 70.0);
    assert_eq!(value(&out, Element::Exports), 0.0);
    assert_eq!(value(&out, Element::Food), 110.0);
    assert_eq!(value(&out, Element::Feed), 10.0);
    assert!(out.check_balance(1e-12).is_ok());

    // default compensator for production is imports
    let defaulted = balanced_scaling(
        &sheet,
        &BalancedScaling::new(Element::Production, 0.5).with_constant(true),
    )
    .unwrap();
    assert_eq!(defaulted, out);
}

#[test]
fn test_constant_scaling_infeasible() {
    let sheet = single_cell();
    let params = BalancedScaling::new(Element::Production, 1.5).with_constant(true);
    let err = balanced_scaling(&sheet, &params).unwrap_err();
    match err {
        Error::InfeasibleScaling(Infeasibility::NegativeResult { element, value, .. }) => {
            assert_eq!(element, Element::Imports);
            assert_eq!(value, -30.0);
        }
        other => panic!("expected infeasible scaling, got {other}"),
    }
}

#[test]
fn test_propagated_scaling_rebalances_utilization() {
    let sheet = single_cell();
    let params = BalancedScaling::new(Element::Production, 0.5);
    let out = balanced_scaling(&sheet, &params).unwrap();

    // -50 split 110:10 across food and feed
    assert_eq!(value(&out, Element::Production), 50.0);
    assert_eq!(value(&out, Element::Imports), 20.0);
    assert!((value(&out, Element::Food) - (110.0 - 50.0 * 110.0 / 120.0)).abs() < 1e-9);
    assert!((value(&out, Element::Feed) - (10.0 - 50.0 * 10.0 / 120.0)).abs() < 1e-9);
    assert!(out.check_balance(1e-9).is_ok());
}

/// Stocks are built up (`stock_change < 0`) and a residual is carried.
fn with_stocks() -> FoodBalanceSheet {
    FoodBalanceSheet::from_long(&[
        record(Element::Production, 2511, "UK", 2020, 100.0),
        record(Element::Imports, 2511, "UK", 2020, 20.0),
        record(Element::StockChange, 2511, "UK", 2020, -20.0),
        record(Element::Food, 2511, "UK", 2020, 90.0),
        record(Element::Residual, 2511, "UK", 2020, 10.0),
    ])
    .unwrap()
}

#[test]
fn test_stock_change_held_constant_by_imports() {
    let sheet = with_stocks();
    let params = BalancedScaling::new(Element::StockChange, 2.0).with_constant(true);
    let out = balanced_scaling(&sheet, &params).unwrap();

    assert_eq!(value(&out, Element::StockChange), -40.0);
    assert_eq!(value(&out, Element::Imports), 40.0);
    assert_eq!(out.supply_total().data(), sheet.supply_total().data());
    assert!(out.check_balance(1e-12).is_ok());
}

#[test]
fn test_stock_change_propagates_to_utilization() {
    let sheet = with_stocks();
    let params = BalancedScaling::new(Element::StockChange, 3.0).with_target(Element::Food);
    let out = balanced_scaling(&sheet, &params).unwrap();

    assert_eq!(value(&out, Element::StockChange), -60.0);
    assert_eq!(value(&out, Element::Food), 50.0);
    assert!(out.check_balance(1e-12).is_ok());
}

#[test]
fn test_residual_may_go_negative() {
    let sheet = with_stocks();
    let params = BalancedScaling::new(Element::Production, 0.5).with_target(Element::Residual);
    let out = balanced_scaling(&sheet, &params).unwrap();

    assert_eq!(value(&out, Element::Production), 50.0);
    assert_eq!(value(&out, Element::Residual), -40.0);
    assert!(out.check_balance(1e-12).is_ok());

    let food_only = BalancedScaling::new(Element::Production, 0.0).with_target(Element::Food);
    assert!(matches!(
        balanced_scaling(&sheet, &food_only),
        Err(Error::InfeasibleScaling(Infeasibility::NegativeResult { .. }))
    ));
}

#[test]
fn test_negative_factor_in_time_phased_scale() {
    let sheet = single_cell();
    let mut curve = logistic_scale(2020, 2020, 2020, 2020, 1.0, 1.0).unwrap();
    curve.data_mut()[0] = -0.25;
    let params = BalancedScaling::new(Element::Food, Scale::Array(curve));
    assert_eq!(
        balanced_scaling(&sheet, &params).unwrap_err(),
        Error::InvalidScale { value: -0.25 }
    );
}

#[test]
fn test_empty_selection_is_an_error() {
    let sheet = single_cell();
    let params = BalancedScaling::new(Element::Production, 0.5)
        .with_constant(true)
        .with_selection(Selection::all().with("Item", [9999]));
    let err = balanced_scaling(&sheet, &params).unwrap_err();
    assert_eq!(
        err,
        Error::SelectionEmpty {
            axis: "Item".to_string(),
            missing: labels([9999]),
        }
    );

    let params = BalancedScaling::new(Element::Production, 0.5)
        .with_selection(Selection::all().with("Country", ["UK"]));
    assert!(matches!(
        balanced_scaling(&sheet, &params),
        Err(Error::SelectionEmpty { .. })
    ));
}

#[test]
fn test_missing_origin() {
    let sheet = single_cell();
    let params = BalancedScaling::new(Element::Seed, 0.5);
    assert_eq!(
        balanced_scaling(&sheet, &params).unwrap_err(),
        Error::MissingElement(Element::Seed)
    );
}

#[test]
fn test_scale_one_is_identity() {
    let sheet = panel();
    for origin in [Element::Production, Element::Feed, Element::Exports] {
        for constant in [true, false] {
            let params = BalancedScaling::new(origin, 1.0).with_constant(constant);
            let out = balanced_scaling(&sheet, &params).unwrap();
            assert_eq!(out, sheet, "origin {origin}, constant {constant}");
        }
    }
}

#[test]
fn test_cells_outside_selection_are_bit_identical() {
    let sheet = panel();
    let selection = Selection::all()
        .with("Item", [2731])
        .with("Region", ["FR"])
        .with("Year", [2021, 2022]);
    let params = BalancedScaling::new(Element::Food, 0.5).with_selection(selection.clone());
    let out = balanced_scaling(&sheet, &params).unwrap();
    assert!(out.check_balance(1e-9).is_ok());

    let template = sheet.element(Element::Food).unwrap();
    let mask = template.selection_mask(&selection).unwrap();
    assert_eq!(mask.iter().filter(|m| **m).count(), 2);

    for (element, before) in sheet.arrays() {
        let after = out.element(element).unwrap();
        for (flat, selected) in mask.iter().enumerate() {
            if !selected {
                assert_eq!(
                    before.data()[flat].to_bits(),
                    after.data()[flat].to_bits(),
                    "{element} changed at {}",
                    sheet.describe_cell(flat)
                );
            }
        }
    }
}

#[test]
fn test_interventions_compose() {
    let sheet = panel();
    let halve_food = BalancedScaling::new(Element::Food, 0.5);
    let restore_production = BalancedScaling::new(Element::Production, 1.1).with_constant(true);

    let once = balanced_scaling(&sheet, &halve_food).unwrap();
    let twice = balanced_scaling(&once, &restore_production).unwrap();
    assert!(twice.check_balance(1e-9).is_ok());

    // each call only sees its input
    let again = balanced_scaling(&sheet, &halve_food).unwrap();
    assert_eq!(once, again);
}

#[test]
fn test_time_phased_scale() {
    let sheet = panel();
    let curve = logistic_scale(2020, 2020, 2022, 2022, 1.0, 0.5).unwrap();
    let params = BalancedScaling::new(Element::Food, Scale::Array(curve.clone()));
    let out = balanced_scaling(&sheet, &params).unwrap();
    assert!(out.check_balance(1e-9).is_ok());

    let before = sheet.element(Element::Food).unwrap();
    let after = out.element(Element::Food).unwrap();
    for year in 2020..=2022 {
        let coords = [Label::Int(2511), Label::Int(year), Label::from("UK")];
        let factor = curve.get(&[Label::Int(year)]).unwrap();
        let expected = before.get(&coords).unwrap() * factor;
        assert!((after.get(&coords).unwrap() - expected).abs() < 1e-9);
    }
}

#[test]
fn test_scale_array_missing_year() {
    let sheet = panel();
    let curve = logistic_scale(2020, 2020, 2021, 2021, 1.0, 0.5).unwrap();
    let params = BalancedScaling::new(Element::Food, Scale::Array(curve));
    assert!(matches!(
        balanced_scaling(&sheet, &params),
        Err(Error::Array(_))
    ));
}

#[test]
fn test_ssr_aggregation_weighs_by_magnitude() {
    let sheet = FoodBalanceSheet::from_wide(
        &[Element::Production, Element::Imports, Element::Exports],
        labels([1, 2]),
        vec![2020],
        None,
        vec![100.0, 0.0, 0.0, 10.0, 0.0, 0.0],
    )
    .unwrap();

    let aggregate = self_sufficiency_ratio(&sheet, None, false).unwrap();
    assert!((aggregate.data()[0] - 100.0 / 110.0).abs() < 1e-12);

    let per_item = self_sufficiency_ratio(&sheet, None, true).unwrap();
    assert_eq!(per_item.total() / 2.0, 0.5);
}

#[test]
fn test_ssr_without_supply_is_nan() {
    let sheet = FoodBalanceSheet::from_wide(
        &[Element::Production, Element::Imports, Element::Exports],
        labels([1]),
        vec![2020],
        Some(labels(["UK"])),
        vec![0.0, 0.0, 0.0],
    )
    .unwrap();
    let ssr = self_sufficiency_ratio(&sheet, None, true).unwrap();
    assert_eq!(ssr.dims(), ["Item", "Year", "Region"]);
    assert!(ssr.data()[0].is_nan());
}
