//! The sample sheet and interventions under `demos/` stay loadable and
//! feasible.

use std::path::PathBuf;

use agrifood_food::{Element, compare, scenario};
use agrifood_foundation::Label;
use agrifood_run::read_sheet;

fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

#[test]
fn test_demo_sheet_is_balanced() {
    let sheet = read_sheet(&demos().join("uk_sheet.yaml")).unwrap();
    assert_eq!(sheet.items().len(), 2);
    assert_eq!(sheet.years().len(), 3);
    assert!(sheet.check_balance(1e-9).is_ok());
}

#[test]
fn test_demo_interventions_apply() {
    let sheet = read_sheet(&demos().join("uk_sheet.yaml")).unwrap();
    let interventions: Vec<_> = scenario::load_scenarios(demos().join("interventions"))
        .into_values()
        .collect();
    assert_eq!(interventions.len(), 2);

    let outcomes = compare(&sheet, &interventions);
    for outcome in &outcomes {
        let result = outcome.sheet.as_ref().unwrap();
        assert!(result.check_balance(1e-9).is_ok(), "{}", outcome.name);
        assert!(outcome.metrics.iter().all(|(_, values)| values.is_ok()));
    }

    let halved = outcomes
        .iter()
        .find(|o| o.name == "halve_beef")
        .and_then(|o| o.sheet.as_ref().ok())
        .unwrap();
    let food = halved.element(Element::Food).unwrap();
    let coords = |year: i64| [Label::Int(2731), Label::Int(year), Label::from("UK")];
    assert_eq!(food.get(&coords(2020)).unwrap(), 1100.0);
    assert_eq!(food.get(&coords(2022)).unwrap(), 550.0);
}
