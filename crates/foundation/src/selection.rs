//! Partial label selections
//!
//! A selection names a subset of labels on zero or more axes. Axes it does
//! not mention are selected in full. Selections never silently match
//! nothing: naming an absent axis, an absent label, or an empty label list
//! is reported as [`ArrayError::EmptySelection`].

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ArrayError, Result};
use crate::{Axis, Label};

/// Axis name → labels to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    criteria: IndexMap<String, Vec<Label>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Label),
    Many(Vec<Label>),
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, OneOrMany>::deserialize(deserializer)?;
        let criteria = raw
            .into_iter()
            .map(|(axis, labels)| {
                let labels = match labels {
                    OneOrMany::One(label) => vec![label],
                    OneOrMany::Many(labels) => labels,
                };
                (axis, labels)
            })
            .collect();
        Ok(Self { criteria })
    }
}

impl Selection {
    /// Select everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder: restrict an axis to the given labels.
    ///
    /// Calling this twice for the same axis replaces the earlier labels.
    pub fn with<I, L>(mut self, axis: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.criteria
            .insert(axis.into(), labels.into_iter().map(Into::into).collect());
        self
    }

    /// True if no axis is restricted.
    pub fn is_all(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Labels requested on an axis, if it is restricted.
    pub fn get(&self, axis: &str) -> Option<&[Label]> {
        self.criteria.get(axis).map(Vec::as_slice)
    }

    /// Restricted axes and their labels.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Label])> {
        self.criteria
            .iter()
            .map(|(axis, labels)| (axis.as_str(), labels.as_slice()))
    }

    /// Resolve against a set of axes.
    ///
    /// Returns, per axis, `None` when the axis is unrestricted or the
    /// selected positions in request order.
    pub fn resolve(&self, axes: &[Axis]) -> Result<Vec<Option<Vec<usize>>>> {
        for (name, labels) in &self.criteria {
            if !axes.iter().any(|axis| axis.name() == name) {
                return Err(ArrayError::EmptySelection {
                    axis: name.clone(),
                    missing: labels.clone(),
                });
            }
        }

        axes.iter()
            .map(|axis| {
                let Some(labels) = self.criteria.get(axis.name()) else {
                    return Ok(None);
                };
                let missing: Vec<Label> = labels
                    .iter()
                    .filter(|label| !axis.contains(label))
                    .cloned()
                    .collect();
                if labels.is_empty() || !missing.is_empty() {
                    return Err(ArrayError::EmptySelection {
                        axis: axis.name().to_string(),
                        missing,
                    });
                }
                let mut positions: Vec<usize> = Vec::with_capacity(labels.len());
                for label in labels {
                    let pos = axis.position(label)?;
                    if !positions.contains(&pos) {
                        positions.push(pos);
                    }
                }
                Ok(Some(positions))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes() -> Vec<Axis> {
        vec![
            Axis::new("Item", [2731, 2732]).unwrap(),
            Axis::new("Year", [2020, 2021, 2022]).unwrap(),
        ]
    }

    #[test]
    fn test_unrestricted_axes_resolve_to_none() {
        let resolved = Selection::all().resolve(&axes()).unwrap();
        assert_eq!(resolved, vec![None, None]);
    }

    #[test]
    fn test_positions_follow_request_order() {
        let sel = Selection::all().with("Year", [2022, 2020, 2022]);
        let resolved = sel.resolve(&axes()).unwrap();
        assert_eq!(resolved, vec![None, Some(vec![2, 0])]);
    }

    #[test]
    fn test_missing_label_is_empty_selection() {
        let sel = Selection::all().with("Item", [9999]);
        let err = sel.resolve(&axes()).unwrap_err();
        assert!(matches!(
            err,
            ArrayError::EmptySelection { ref axis, ref missing }
                if axis == "Item" && missing == &vec![Label::Int(9999)]
        ));
    }

    #[test]
    fn test_unknown_axis_is_empty_selection() {
        let sel = Selection::all().with("Region", ["UK"]);
        assert!(matches!(
            sel.resolve(&axes()),
            Err(ArrayError::EmptySelection { .. })
        ));
    }

    #[test]
    fn test_empty_label_list_is_empty_selection() {
        let sel = Selection::all().with("Item", Vec::<Label>::new());
        assert!(matches!(
            sel.resolve(&axes()),
            Err(ArrayError::EmptySelection { .. })
        ));
    }

    #[test]
    fn test_deserialize_scalar_or_list() {
        let sel: Selection =
            serde_json::from_str(r#"{"Item": 2731, "Region": ["UK", "FR"]}"#).unwrap();
        assert_eq!(sel.get("Item"), Some(&[Label::Int(2731)][..]));
        assert_eq!(sel.get("Region").map(<[Label]>::len), Some(2));
    }
}
