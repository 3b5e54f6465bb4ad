//! Batch comparison of interventions
//!
//! Every intervention runs against the same source sheet on the rayon pool.
//! Sheets share storage copy-on-write, so no intervention can observe
//! another's writes and no locking is needed.

use agrifood_foundation::LabeledArray;
use rayon::prelude::*;
use tracing::{info, instrument};

use crate::error::Result;
use crate::metrics::Metric;
use crate::scenario::Intervention;
use crate::sheet::FoodBalanceSheet;

/// Result of one intervention in a batch
#[derive(Debug, Clone)]
pub struct Outcome {
    pub name: String,
    pub sheet: Result<FoodBalanceSheet>,
    /// Requested indicators on the resulting sheet, aggregated over items.
    /// Empty when the intervention failed.
    pub metrics: Vec<(Metric, Result<LabeledArray>)>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.sheet.is_ok()
    }
}

/// Apply each intervention to `sheet` in parallel.
///
/// Outcomes come back in the order of `interventions`. A failing
/// intervention does not affect the others.
#[instrument(skip_all, fields(count = interventions.len()))]
pub fn compare(sheet: &FoodBalanceSheet, interventions: &[Intervention]) -> Vec<Outcome> {
    let outcomes: Vec<Outcome> = interventions
        .par_iter()
        .map(|intervention| run(sheet, intervention))
        .collect();

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(total = outcomes.len(), failed, "batch complete");
    outcomes
}

fn run(sheet: &FoodBalanceSheet, intervention: &Intervention) -> Outcome {
    let result = intervention.apply(sheet);
    let metrics = match &result {
        Ok(out) => intervention
            .metrics
            .iter()
            .map(|&metric| (metric, metric.compute(out, None, false)))
            .collect(),
        Err(_) => Vec::new(),
    };
    Outcome {
        name: intervention.metadata.name.clone(),
        sheet: result,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::scenario::Step;
    use agrifood_foundation::labels;

    fn sheet() -> FoodBalanceSheet {
        FoodBalanceSheet::from_wide(
            &[
                Element::Production,
                Element::Imports,
                Element::Exports,
                Element::Food,
                Element::Feed,
            ],
            labels([2731]),
            vec![2020],
            None,
            vec![100.0, 20.0, 0.0, 110.0, 10.0],
        )
        .unwrap()
    }

    #[test]
    fn test_compare_preserves_order_and_isolates_failures() {
        let interventions: Vec<Intervention> = (0..8)
            .map(|i| {
                let scale = if i == 3 { 1.5 } else { 0.1 * i as f64 };
                Intervention::new(format!("run_{i}"))
                    .with_step(Step::new(Element::Production, scale).with_constant(true))
                    .with_metric(Metric::Ssr)
            })
            .collect();

        let source = sheet();
        let outcomes = compare(&source, &interventions);
        assert_eq!(outcomes.len(), 8);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.name, format!("run_{i}"));
            assert_eq!(outcome.is_ok(), i != 3);
        }
        assert!(outcomes[3].metrics.is_empty());

        let (metric, ssr) = &outcomes[5].metrics[0];
        assert_eq!(*metric, Metric::Ssr);
        let ssr = ssr.as_ref().unwrap();
        assert!((ssr.data()[0] - 50.0 / 120.0).abs() < 1e-12);

        assert_eq!(source, sheet());
    }
}
