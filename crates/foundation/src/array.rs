//! Labeled arrays
//!
//! N-dimensional `f64` arrays with named, labeled axes. Storage is a
//! row-major `Arc<[f64]>` shared between clones; writes go through
//! `Arc::make_mut`, so cloning a table is cheap and a transform never
//! disturbs the array it was derived from.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, Result};
use crate::{Axis, Label, Selection};

/// How new labels appended by [`LabeledArray::extend_axis`] are populated.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// New cells are NaN ("no data").
    Nan,
    /// New cells copy existing labels: either one source label for every new
    /// label, or one source label per new label.
    CopyFrom(Vec<Label>),
    /// New cells are the last existing label scaled by one factor per new
    /// label. `ScaledLast(vec![1.0; n])` repeats the last label unchanged.
    ScaledLast(Vec<f64>),
}

/// Dense labeled array with copy-on-write storage
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ArrayRepr", into = "ArrayRepr")]
pub struct LabeledArray {
    axes: Arc<[Axis]>,
    data: Arc<[f64]>,
}

#[derive(Serialize, Deserialize)]
struct ArrayRepr {
    axes: Vec<Axis>,
    data: Vec<f64>,
}

impl TryFrom<ArrayRepr> for LabeledArray {
    type Error = ArrayError;

    fn try_from(repr: ArrayRepr) -> Result<Self> {
        LabeledArray::new(repr.axes, repr.data)
    }
}

impl From<LabeledArray> for ArrayRepr {
    fn from(array: LabeledArray) -> Self {
        ArrayRepr {
            axes: array.axes.to_vec(),
            data: array.data.to_vec(),
        }
    }
}

fn check_axes(axes: &[Axis]) -> Result<()> {
    for (i, axis) in axes.iter().enumerate() {
        if axes[..i].iter().any(|other| other.name() == axis.name()) {
            return Err(ArrayError::DuplicateAxis(axis.name().to_string()));
        }
    }
    Ok(())
}

fn strides_for(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn unravel_into(flat: usize, shape: &[usize], strides: &[usize], out: &mut [usize]) {
    for i in 0..shape.len() {
        out[i] = (flat / strides[i]) % shape[i];
    }
}

fn nan_sum(acc: f64, value: f64) -> f64 {
    if value.is_nan() { acc } else { acc + value }
}

impl LabeledArray {
    /// Create an array from axes and row-major data.
    pub fn new(axes: Vec<Axis>, data: Vec<f64>) -> Result<Self> {
        check_axes(&axes)?;
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ArrayError::LengthMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            axes: axes.into(),
            data: data.into(),
        })
    }

    /// Create an array with every cell set to `value`.
    pub fn filled(axes: Vec<Axis>, value: f64) -> Result<Self> {
        check_axes(&axes)?;
        let len = axes.iter().map(Axis::len).product();
        Ok(Self {
            axes: axes.into(),
            data: vec![value; len].into(),
        })
    }

    /// Create a new array sharing this array's axes.
    pub fn with_data(&self, data: Vec<f64>) -> Result<Self> {
        if data.len() != self.len() {
            return Err(ArrayError::LengthMismatch {
                shape: self.shape(),
                expected: self.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            axes: Arc::clone(&self.axes),
            data: data.into(),
        })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Axis names in storage order.
    pub fn dims(&self) -> Vec<&str> {
        self.axes.iter().map(Axis::name).collect()
    }

    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|axis| axis.name() == name)
    }

    pub fn axis(&self, name: &str) -> Result<&Axis> {
        self.axis_index(name)
            .map(|i| &self.axes[i])
            .ok_or_else(|| ArrayError::UnknownAxis(name.to_string()))
    }

    pub fn has_axis(&self, name: &str) -> bool {
        self.axis_index(name).is_some()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw data in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable raw data; detaches from shared storage first.
    pub fn data_mut(&mut self) -> &mut [f64] {
        Arc::make_mut(&mut self.data)
    }

    /// True when both arrays have identical axes (names, labels, order).
    pub fn same_axes(&self, other: &LabeledArray) -> bool {
        Arc::ptr_eq(&self.axes, &other.axes) || self.axes == other.axes
    }

    fn strides(&self) -> Vec<usize> {
        strides_for(&self.shape())
    }

    /// Per-axis positions of a flat index.
    pub fn unravel(&self, flat: usize) -> Vec<usize> {
        let shape = self.shape();
        let strides = strides_for(&shape);
        let mut out = vec![0; shape.len()];
        unravel_into(flat, &shape, &strides, &mut out);
        out
    }

    /// Flat index of labels given in axis order.
    pub fn flat_index(&self, coords: &[Label]) -> Result<usize> {
        if coords.len() != self.axes.len() {
            return Err(ArrayError::InvalidArgument(format!(
                "expected {} coordinates, got {}",
                self.axes.len(),
                coords.len()
            )));
        }
        let strides = self.strides();
        let mut flat = 0;
        for ((axis, label), stride) in self.axes.iter().zip(coords).zip(strides) {
            flat += axis.position(label)? * stride;
        }
        Ok(flat)
    }

    /// Value at labels given in axis order.
    pub fn get(&self, coords: &[Label]) -> Result<f64> {
        Ok(self.data[self.flat_index(coords)?])
    }

    /// Set the value at labels given in axis order (copy-on-write).
    pub fn set(&mut self, coords: &[Label], value: f64) -> Result<()> {
        let flat = self.flat_index(coords)?;
        self.data_mut()[flat] = value;
        Ok(())
    }

    /// `(axis, label)` pairs naming a flat index.
    pub fn coords(&self, flat: usize) -> Vec<(&str, &Label)> {
        self.unravel(flat)
            .into_iter()
            .zip(self.axes.iter())
            .filter_map(|(pos, axis)| axis.label(pos).map(|label| (axis.name(), label)))
            .collect()
    }

    /// Apply a function to every cell.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            axes: Arc::clone(&self.axes),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two arrays with identical axes cell by cell.
    pub fn zip_with(&self, other: &LabeledArray, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if !self.same_axes(other) {
            return Err(ArrayError::AxisMismatch {
                left: self.dims().iter().map(|s| s.to_string()).collect(),
                right: other.dims().iter().map(|s| s.to_string()).collect(),
            });
        }
        Ok(Self {
            axes: Arc::clone(&self.axes),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Combine with an array whose axes are a subset of this array's.
    ///
    /// `other` is aligned by label: every label of a shared axis in `self`
    /// must exist on the matching axis of `other`. Extra labels in `other`
    /// are ignored. The result has this array's axes.
    pub fn broadcast_with(
        &self,
        other: &LabeledArray,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self> {
        if self.same_axes(other) {
            return self.zip_with(other, f);
        }

        let other_strides = other.strides();
        let mut mapping: Vec<(usize, usize, Vec<usize>)> = Vec::with_capacity(other.axes.len());
        for (j, other_axis) in other.axes.iter().enumerate() {
            let i = self.axis_index(other_axis.name()).ok_or_else(|| {
                ArrayError::AxisMismatch {
                    left: self.dims().iter().map(|s| s.to_string()).collect(),
                    right: other.dims().iter().map(|s| s.to_string()).collect(),
                }
            })?;
            let lookup = self.axes[i]
                .labels()
                .map(|label| {
                    other_axis
                        .index_of(label)
                        .ok_or_else(|| ArrayError::Misaligned {
                            axis: other_axis.name().to_string(),
                            label: label.clone(),
                        })
                })
                .collect::<Result<Vec<usize>>>()?;
            mapping.push((i, other_strides[j], lookup));
        }

        let shape = self.shape();
        let strides = strides_for(&shape);
        let mut idx = vec![0; shape.len()];
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(flat, &value)| {
                unravel_into(flat, &shape, &strides, &mut idx);
                let other_flat: usize = mapping
                    .iter()
                    .map(|(i, stride, lookup)| lookup[idx[*i]] * stride)
                    .sum();
                f(value, other.data[other_flat])
            })
            .collect();

        Ok(Self {
            axes: Arc::clone(&self.axes),
            data,
        })
    }

    /// Per-cell membership of a selection.
    pub fn selection_mask(&self, selection: &Selection) -> Result<Vec<bool>> {
        let resolved = selection.resolve(&self.axes)?;
        let members: Vec<Option<Vec<bool>>> = resolved
            .iter()
            .zip(self.axes.iter())
            .map(|(positions, axis)| {
                positions.as_ref().map(|positions| {
                    let mut member = vec![false; axis.len()];
                    for &p in positions {
                        member[p] = true;
                    }
                    member
                })
            })
            .collect();

        let shape = self.shape();
        let strides = strides_for(&shape);
        let mut idx = vec![0; shape.len()];
        Ok((0..self.len())
            .map(|flat| {
                unravel_into(flat, &shape, &strides, &mut idx);
                members
                    .iter()
                    .zip(&idx)
                    .all(|(member, &i)| member.as_ref().is_none_or(|m| m[i]))
            })
            .collect())
    }

    /// Sub-array containing only the selected labels.
    pub fn select(&self, selection: &Selection) -> Result<Self> {
        if selection.is_all() {
            return Ok(self.clone());
        }
        let resolved = selection.resolve(&self.axes)?;
        let positions: Vec<Vec<usize>> = resolved
            .into_iter()
            .zip(self.axes.iter())
            .map(|(positions, axis)| positions.unwrap_or_else(|| (0..axis.len()).collect()))
            .collect();
        let axes: Vec<Axis> = self
            .axes
            .iter()
            .zip(&positions)
            .map(|(axis, positions)| axis.take(positions))
            .collect();

        let old_strides = self.strides();
        let shape: Vec<usize> = positions.iter().map(Vec::len).collect();
        let strides = strides_for(&shape);
        let len: usize = shape.iter().product();
        let mut idx = vec![0; shape.len()];
        let data = (0..len)
            .map(|flat| {
                unravel_into(flat, &shape, &strides, &mut idx);
                let old_flat: usize = idx
                    .iter()
                    .zip(&positions)
                    .zip(&old_strides)
                    .map(|((&i, positions), stride)| positions[i] * stride)
                    .sum();
                self.data[old_flat]
            })
            .collect();

        Ok(Self {
            axes: axes.into(),
            data,
        })
    }

    /// Sum along an axis, removing it. NaN cells are skipped; a run of only
    /// NaN cells sums to zero.
    pub fn sum_over(&self, name: &str) -> Result<Self> {
        let k = self
            .axis_index(name)
            .ok_or_else(|| ArrayError::UnknownAxis(name.to_string()))?;
        let axes: Vec<Axis> = self
            .axes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != k)
            .map(|(_, axis)| axis.clone())
            .collect();

        let shape = self.shape();
        let strides = strides_for(&shape);
        let out_shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let out_strides = strides_for(&out_shape);
        let mut out = vec![0.0; out_shape.iter().product()];
        let mut idx = vec![0; shape.len()];
        for (flat, &value) in self.data.iter().enumerate() {
            unravel_into(flat, &shape, &strides, &mut idx);
            let out_flat: usize = idx
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != k)
                .zip(&out_strides)
                .map(|((_, &pos), stride)| pos * stride)
                .sum();
            out[out_flat] = nan_sum(out[out_flat], value);
        }

        Ok(Self {
            axes: axes.into(),
            data: out.into(),
        })
    }

    /// Sum of every non-NaN cell.
    pub fn total(&self) -> f64 {
        self.data.iter().copied().fold(0.0, nan_sum)
    }

    /// Append labels to an axis, populating them according to `fill`.
    ///
    /// Repeated labels in `labels` are collapsed to their first occurrence.
    pub fn extend_axis(&self, name: &str, labels: &[Label], fill: &Fill) -> Result<Self> {
        let k = self
            .axis_index(name)
            .ok_or_else(|| ArrayError::UnknownAxis(name.to_string()))?;
        let mut new_labels: Vec<Label> = Vec::with_capacity(labels.len());
        for label in labels {
            if !new_labels.contains(label) {
                new_labels.push(label.clone());
            }
        }

        let axis = &self.axes[k];
        let old_len = axis.len();
        let sources: Vec<Option<(usize, f64)>> = match fill {
            Fill::Nan => vec![None; new_labels.len()],
            Fill::CopyFrom(from) => {
                let from: Vec<usize> = from
                    .iter()
                    .map(|label| axis.position(label))
                    .collect::<Result<_>>()?;
                match from.as_slice() {
                    [single] => vec![Some((*single, 1.0)); new_labels.len()],
                    many if many.len() == new_labels.len() => {
                        many.iter().map(|&p| Some((p, 1.0))).collect()
                    }
                    many => {
                        return Err(ArrayError::InvalidArgument(format!(
                            "cannot copy {} labels onto {} new labels",
                            many.len(),
                            new_labels.len()
                        )));
                    }
                }
            }
            Fill::ScaledLast(factors) => {
                if factors.len() != new_labels.len() {
                    return Err(ArrayError::InvalidArgument(format!(
                        "expected {} projection factors, got {}",
                        new_labels.len(),
                        factors.len()
                    )));
                }
                let last = old_len.checked_sub(1).ok_or_else(|| {
                    ArrayError::InvalidArgument(format!("axis {name} has no labels to project"))
                })?;
                factors.iter().map(|&f| Some((last, f))).collect()
            }
        };

        let mut axes = self.axes.to_vec();
        axes[k] = axis.extended(&new_labels)?;

        let old_strides = self.strides();
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let strides = strides_for(&shape);
        let len: usize = shape.iter().product();
        let mut idx = vec![0; shape.len()];
        let data = (0..len)
            .map(|flat| {
                unravel_into(flat, &shape, &strides, &mut idx);
                let factor = if idx[k] < old_len {
                    1.0
                } else {
                    match sources[idx[k] - old_len] {
                        Some((src, factor)) => {
                            idx[k] = src;
                            factor
                        }
                        None => return f64::NAN,
                    }
                };
                let old_flat: usize = idx.iter().zip(&old_strides).map(|(i, s)| i * s).sum();
                self.data[old_flat] * factor
            })
            .collect();

        Ok(Self {
            axes: axes.into(),
            data,
        })
    }

    /// Sum labels of an axis that map to the same group.
    ///
    /// Groups appear in order of first occurrence. The grouped axis keeps
    /// its name unless `rename` is given.
    pub fn group_sum(
        &self,
        name: &str,
        groups: &IndexMap<Label, Label>,
        rename: Option<&str>,
    ) -> Result<Self> {
        let k = self
            .axis_index(name)
            .ok_or_else(|| ArrayError::UnknownAxis(name.to_string()))?;
        let axis = &self.axes[k];

        let mut group_labels: Vec<Label> = Vec::new();
        let mut target: Vec<usize> = Vec::with_capacity(axis.len());
        for label in axis.labels() {
            let group = groups.get(label).ok_or_else(|| ArrayError::UnknownLabel {
                axis: format!("{name} groups"),
                label: label.clone(),
            })?;
            let pos = match group_labels.iter().position(|g| g == group) {
                Some(pos) => pos,
                None => {
                    group_labels.push(group.clone());
                    group_labels.len() - 1
                }
            };
            target.push(pos);
        }

        let mut axes = self.axes.to_vec();
        axes[k] = Axis::new(rename.unwrap_or(name), group_labels)?;
        check_axes(&axes)?;

        let shape = self.shape();
        let strides = strides_for(&shape);
        let out_shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let out_strides = strides_for(&out_shape);
        let mut out = vec![0.0; out_shape.iter().product()];
        let mut idx = vec![0; shape.len()];
        for (flat, &value) in self.data.iter().enumerate() {
            unravel_into(flat, &shape, &strides, &mut idx);
            idx[k] = target[idx[k]];
            let out_flat: usize = idx.iter().zip(&out_strides).map(|(i, s)| i * s).sum();
            out[out_flat] = nan_sum(out[out_flat], value);
        }

        Ok(Self {
            axes: axes.into(),
            data: out.into(),
        })
    }
}

impl PartialEq for LabeledArray {
    fn eq(&self, other: &Self) -> bool {
        self.same_axes(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

impl fmt::Display for LabeledArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabeledArray(")?;
        for (i, axis) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", axis.name(), axis.len())?;
        }
        write!(f, ")")
    }
}
