//! Named axes
//!
//! An axis is a name plus an ordered set of unique labels. Label lookup is
//! O(1) through the underlying `IndexSet`, and label order is the storage
//! order of the owning array.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, Result};
use crate::Label;

/// A named, ordered set of unique labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AxisRepr", into = "AxisRepr")]
pub struct Axis {
    name: String,
    labels: IndexSet<Label>,
}

#[derive(Serialize, Deserialize)]
struct AxisRepr {
    name: String,
    labels: Vec<Label>,
}

impl TryFrom<AxisRepr> for Axis {
    type Error = ArrayError;

    fn try_from(repr: AxisRepr) -> Result<Self> {
        Axis::new(repr.name, repr.labels)
    }
}

impl From<Axis> for AxisRepr {
    fn from(axis: Axis) -> Self {
        AxisRepr {
            name: axis.name,
            labels: axis.labels.into_iter().collect(),
        }
    }
}

impl Axis {
    /// Create an axis, rejecting duplicate labels.
    pub fn new<I, L>(name: impl Into<String>, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let name = name.into();
        let mut set = IndexSet::new();
        for label in labels {
            let label = label.into();
            if set.contains(&label) {
                return Err(ArrayError::DuplicateLabel { axis: name, label });
            }
            set.insert(label);
        }
        Ok(Self { name, labels: set })
    }

    /// Create an axis from labels that may repeat, keeping first occurrences
    /// and sorting the result.
    pub fn sorted_unique<I, L>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let mut labels: Vec<Label> = labels.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();
        Self {
            name: name.into(),
            labels: labels.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in storage order.
    pub fn labels(&self) -> impl ExactSizeIterator<Item = &Label> {
        self.labels.iter()
    }

    /// Label at a position.
    pub fn label(&self, index: usize) -> Option<&Label> {
        self.labels.get_index(index)
    }

    /// Position of a label, if present.
    pub fn index_of(&self, label: &Label) -> Option<usize> {
        self.labels.get_index_of(label)
    }

    /// Position of a label, or `UnknownLabel`.
    pub fn position(&self, label: &Label) -> Result<usize> {
        self.index_of(label).ok_or_else(|| ArrayError::UnknownLabel {
            axis: self.name.clone(),
            label: label.clone(),
        })
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    /// Keep only the labels at the given positions, in the given order.
    pub(crate) fn take(&self, positions: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            labels: positions
                .iter()
                .filter_map(|&i| self.labels.get_index(i).cloned())
                .collect(),
        }
    }

    /// Append labels, rejecting any already on the axis.
    pub(crate) fn extended(&self, extra: &[Label]) -> Result<Self> {
        let mut labels = self.labels.clone();
        for label in extra {
            if !labels.insert(label.clone()) {
                return Err(ArrayError::DuplicateLabel {
                    axis: self.name.clone(),
                    label: label.clone(),
                });
            }
        }
        Ok(Self {
            name: self.name.clone(),
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let axis = Axis::new("Region", ["UK", "FR"]).unwrap();
        assert_eq!(axis.len(), 2);
        assert_eq!(axis.index_of(&"FR".into()), Some(1));
        assert_eq!(axis.label(0), Some(&Label::from("UK")));
        assert!(axis.position(&"DE".into()).is_err());
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Axis::new("Year", [2020, 2020]).unwrap_err();
        assert!(matches!(err, ArrayError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_sorted_unique() {
        let axis = Axis::sorted_unique("Item", ["chicken", "chicken", "beef"]);
        let labels: Vec<_> = axis.labels().cloned().collect();
        assert_eq!(labels, vec![Label::from("beef"), Label::from("chicken")]);
    }

    #[test]
    fn test_serde_rejects_duplicates() {
        let ok: Axis = serde_json::from_str(r#"{"name":"Year","labels":[2020,2021]}"#).unwrap();
        assert_eq!(ok.len(), 2);

        let dup = serde_json::from_str::<Axis>(r#"{"name":"Year","labels":[2020,2020]}"#);
        assert!(dup.is_err());
    }
}
