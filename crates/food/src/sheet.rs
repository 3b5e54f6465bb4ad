//! Food balance sheets
//!
//! A [`FoodBalanceSheet`] is an ordered set of element arrays sharing the
//! same `Item` × `Year` (× `Region`) axes. Sheets are values: every
//! operation returns a new sheet, and clones share storage until written.

use agrifood_foundation::{Axis, Fill, LabeledArray, Label, Selection, dims};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

use crate::element::{Element, Side};
use crate::error::{Error, Result};
use crate::scale::Scale;

/// One observation in long format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub element: Element,
    pub item: Label,
    pub year: i64,
    #[serde(default)]
    pub region: Option<Label>,
    pub value: f64,
}

/// How [`FoodBalanceSheet::add_years`] fills the new years
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// No data (NaN).
    Empty,
    /// Copy of the last existing year.
    Constant,
    /// Last existing year times one factor per new year.
    Scaled(Vec<f64>),
}

/// Labeled food balance sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SheetRepr", into = "SheetRepr")]
pub struct FoodBalanceSheet {
    elements: IndexMap<Element, LabeledArray>,
    item_axis: usize,
    year_axis: usize,
}

/// Serialized form; NaN cells are written as `null`.
#[derive(Serialize, Deserialize)]
struct SheetRepr {
    axes: Vec<Axis>,
    elements: IndexMap<Element, Vec<Option<f64>>>,
}

impl TryFrom<SheetRepr> for FoodBalanceSheet {
    type Error = Error;

    fn try_from(repr: SheetRepr) -> Result<Self> {
        let arrays = repr
            .elements
            .into_iter()
            .map(|(element, values)| {
                let data = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
                Ok((element, LabeledArray::new(repr.axes.clone(), data)?))
            })
            .collect::<Result<Vec<_>>>()?;
        FoodBalanceSheet::new(arrays)
    }
}

impl From<FoodBalanceSheet> for SheetRepr {
    fn from(sheet: FoodBalanceSheet) -> Self {
        SheetRepr {
            axes: sheet.axes().to_vec(),
            elements: sheet
                .elements
                .iter()
                .map(|(element, array)| {
                    let values = array
                        .data()
                        .iter()
                        .map(|&v| if v.is_nan() { None } else { Some(v) })
                        .collect();
                    (*element, values)
                })
                .collect(),
        }
    }
}

impl FoodBalanceSheet {
    /// Wrap element arrays into a sheet.
    ///
    /// Every array must share the same axes, which must include `Item` and
    /// `Year`. Values are not inspected.
    pub fn new(arrays: impl IntoIterator<Item = (Element, LabeledArray)>) -> Result<Self> {
        let mut elements: IndexMap<Element, LabeledArray> = IndexMap::new();
        for (element, array) in arrays {
            if let Some((_, first)) = elements.first() {
                if !first.same_axes(&array) {
                    return Err(Error::InvalidSheet(format!(
                        "element {element} has axes {:?}, expected {:?}",
                        array.dims(),
                        first.dims()
                    )));
                }
            }
            if elements.insert(element, array).is_some() {
                return Err(Error::InvalidSheet(format!("duplicate element {element}")));
            }
        }

        let Some((_, first)) = elements.first() else {
            return Err(Error::InvalidSheet("no elements".to_string()));
        };
        let required = |name: &str| {
            first
                .axis_index(name)
                .ok_or_else(|| Error::InvalidSheet(format!("missing {name} axis")))
        };
        let item_axis = required(dims::ITEM)?;
        let year_axis = required(dims::YEAR)?;

        Ok(Self {
            elements,
            item_axis,
            year_axis,
        })
    }

    /// Build a sheet from long-format records.
    ///
    /// Items, years and regions are de-duplicated and sorted; cells without
    /// a record are NaN. Either every record names a region or none does.
    pub fn from_long(records: &[Record]) -> Result<Self> {
        let with_region = records.iter().filter(|r| r.region.is_some()).count();
        if with_region != 0 && with_region != records.len() {
            return Err(Error::InvalidSheet(
                "records mix regional and non-regional rows".to_string(),
            ));
        }

        let mut axes = vec![
            Axis::sorted_unique(dims::ITEM, records.iter().map(|r| r.item.clone())),
            Axis::sorted_unique(dims::YEAR, records.iter().map(|r| r.year)),
        ];
        if with_region > 0 {
            axes.push(Axis::sorted_unique(
                dims::REGION,
                records.iter().filter_map(|r| r.region.clone()),
            ));
        }

        let mut arrays: IndexMap<Element, LabeledArray> = IndexMap::new();
        for record in records {
            let array = match arrays.entry(record.element) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(LabeledArray::filled(axes.clone(), f64::NAN)?),
            };
            let mut coords = vec![record.item.clone(), Label::Int(record.year)];
            coords.extend(record.region.clone());
            let flat = array.flat_index(&coords)?;
            if !array.data()[flat].is_nan() {
                return Err(Error::InvalidSheet(format!(
                    "duplicate record for {} at {}",
                    record.element,
                    describe(array, flat)
                )));
            }
            array.data_mut()[flat] = record.value;
        }

        Self::new(arrays)
    }

    /// Build a sheet from dense data laid out as
    /// `[element][item][year]` or `[element][item][year][region]`.
    pub fn from_wide(
        elements: &[Element],
        items: Vec<Label>,
        years: Vec<i64>,
        regions: Option<Vec<Label>>,
        data: Vec<f64>,
    ) -> Result<Self> {
        let mut axes = vec![Axis::new(dims::ITEM, items)?, Axis::new(dims::YEAR, years)?];
        if let Some(regions) = regions {
            axes.push(Axis::new(dims::REGION, regions)?);
        }
        let per_element: usize = axes.iter().map(Axis::len).product();
        if data.len() != per_element * elements.len() {
            return Err(Error::InvalidSheet(format!(
                "expected {} values for {} elements, got {}",
                per_element * elements.len(),
                elements.len(),
                data.len()
            )));
        }

        let arrays = elements
            .iter()
            .zip(data.chunks(per_element.max(1)))
            .map(|(&element, chunk)| {
                Ok((element, LabeledArray::new(axes.clone(), chunk.to_vec())?))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(arrays)
    }

    /// Any element array; all share the sheet's axes.
    fn template(&self) -> &LabeledArray {
        &self.elements[0]
    }

    pub fn axes(&self) -> &[Axis] {
        self.template().axes()
    }

    pub fn axis(&self, name: &str) -> Result<&Axis> {
        Ok(self.template().axis(name)?)
    }

    pub fn items(&self) -> &Axis {
        &self.axes()[self.item_axis]
    }

    pub fn years(&self) -> &Axis {
        &self.axes()[self.year_axis]
    }

    pub fn regions(&self) -> Option<&Axis> {
        self.axes().iter().find(|axis| axis.name() == dims::REGION)
    }

    /// Number of (Item, Year, Region) cells.
    pub fn cell_count(&self) -> usize {
        self.template().len()
    }

    /// Human-readable name of a cell, e.g. `Item=2731, Year=2020`.
    pub fn describe_cell(&self, flat: usize) -> String {
        describe(self.template(), flat)
    }

    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.elements.keys().copied()
    }

    pub fn arrays(&self) -> impl Iterator<Item = (Element, &LabeledArray)> {
        self.elements.iter().map(|(element, array)| (*element, array))
    }

    pub fn has_element(&self, element: Element) -> bool {
        self.elements.contains_key(&element)
    }

    pub fn get(&self, element: Element) -> Option<&LabeledArray> {
        self.elements.get(&element)
    }

    /// Element array, or `MissingElement`.
    pub fn element(&self, element: Element) -> Result<&LabeledArray> {
        self.get(element).ok_or(Error::MissingElement(element))
    }

    /// Replace or add one element array. The array must share the sheet's axes.
    pub fn with_element(&self, element: Element, array: LabeledArray) -> Result<Self> {
        if !self.template().same_axes(&array) {
            return Err(Error::InvalidSheet(format!(
                "element {element} has axes {:?}, expected {:?}",
                array.dims(),
                self.template().dims()
            )));
        }
        let mut out = self.clone();
        out.elements.insert(element, array);
        Ok(out)
    }

    /// Elements present on one side of the identity.
    pub fn side_elements(&self, side: Side) -> Vec<Element> {
        self.elements().filter(|e| e.side() == side).collect()
    }

    /// Signed side total per cell; NaN counts as zero.
    pub fn side_total(&self, side: Side) -> LabeledArray {
        let mut total = self.template().map(|_| 0.0);
        let acc = total.data_mut();
        for (element, array) in self.arrays().filter(|(e, _)| e.side() == side) {
            let coef = element.coefficient();
            for (acc, &value) in acc.iter_mut().zip(array.data()) {
                *acc += coef * value.nan_to_zero();
            }
        }
        total
    }

    /// production + imports − exports + stock_change
    pub fn supply_total(&self) -> LabeledArray {
        self.side_total(Side::Supply)
    }

    /// Sum of utilization elements.
    pub fn utilization_total(&self) -> LabeledArray {
        self.side_total(Side::Utilization)
    }

    /// Supply minus utilization per cell.
    pub fn imbalance(&self) -> LabeledArray {
        let mut diff = self.supply_total();
        let utilization = self.utilization_total();
        for (d, u) in diff.data_mut().iter_mut().zip(utilization.data()) {
            *d -= u;
        }
        diff
    }

    /// Sheet with `domestic_supply` materialized from the supply side.
    pub fn with_domestic_supply(&self) -> Self {
        let mut out = self.clone();
        out.elements
            .insert(Element::DomesticSupply, self.supply_total());
        out
    }

    /// True if the sheet populates both sides of the identity.
    ///
    /// Single-sided sheets (for example a table of `food` only) are exempt
    /// from the accounting identity.
    pub fn is_accounting(&self) -> bool {
        !self.side_elements(Side::Supply).is_empty()
            && !self.side_elements(Side::Utilization).is_empty()
    }

    /// Sum of absolute values of every element taking part in the identity,
    /// per cell. The scale against which imbalances are measured.
    fn gross_magnitude(&self) -> Vec<f64> {
        let mut gross = vec![0.0; self.cell_count()];
        for (element, array) in self.arrays().filter(|(e, _)| e.side() != Side::Derived) {
            for (acc, &value) in gross.iter_mut().zip(array.data()) {
                *acc += (element.coefficient() * value.nan_to_zero()).abs();
            }
        }
        gross
    }

    /// Verify supply equals utilization in every cell.
    ///
    /// The tolerance is relative to the gross magnitude of the cell's
    /// entries, so sheets in any unit are checked alike. Reports the worst
    /// offending cell.
    pub fn check_balance(&self, tolerance: f64) -> Result<()> {
        if !self.is_accounting() {
            return Ok(());
        }
        let supply = self.supply_total();
        let utilization = self.utilization_total();
        let gross = self.gross_magnitude();

        let mut worst: Option<(usize, f64)> = None;
        let cells = supply.data().iter().zip(utilization.data()).zip(&gross);
        for (flat, ((&s, &u), &g)) in cells.enumerate() {
            let excess = (s - u).abs() - tolerance * g;
            if excess > 0.0 && worst.is_none_or(|(_, w)| excess > w) {
                worst = Some((flat, excess));
            }
        }

        match worst {
            None => Ok(()),
            Some((flat, _)) => Err(Error::Unbalanced {
                cell: self.describe_cell(flat),
                supply: supply.data()[flat],
                utilization: utilization.data()[flat],
            }),
        }
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.check_balance(tolerance).is_ok()
    }

    /// Sheet restricted to a selection of labels.
    pub fn select(&self, selection: &Selection) -> Result<Self> {
        self.try_map(|array| Ok(array.select(selection)?))
    }

    fn try_map(&self, f: impl Fn(&LabeledArray) -> Result<LabeledArray>) -> Result<Self> {
        let arrays = self
            .arrays()
            .map(|(element, array)| Ok((element, f(array)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(arrays)
    }

    fn extend(&self, name: &str, labels: &[Label], fill: &Fill) -> Result<Self> {
        self.try_map(|array| Ok(array.extend_axis(name, labels, fill)?))
    }

    /// Append items, either empty (NaN) or copied from existing items.
    ///
    /// `copy_from` is one existing item for all new items or one per new item.
    pub fn add_items(&self, items: &[Label], copy_from: Option<&[Label]>) -> Result<Self> {
        let fill = copy_from.map_or(Fill::Nan, |from| Fill::CopyFrom(from.to_vec()));
        self.extend(dims::ITEM, items, &fill)
    }

    /// Append regions, either empty (NaN) or copied from existing regions.
    pub fn add_regions(&self, regions: &[Label], copy_from: Option<&[Label]>) -> Result<Self> {
        let fill = copy_from.map_or(Fill::Nan, |from| Fill::CopyFrom(from.to_vec()));
        self.extend(dims::REGION, regions, &fill)
    }

    /// Append years projected from the last existing year.
    pub fn add_years(&self, years: &[i64], projection: &Projection) -> Result<Self> {
        let mut labels: Vec<Label> = Vec::with_capacity(years.len());
        for &year in years {
            if !labels.contains(&Label::Int(year)) {
                labels.push(Label::Int(year));
            }
        }
        let fill = match projection {
            Projection::Empty => Fill::Nan,
            Projection::Constant => Fill::ScaledLast(vec![1.0; labels.len()]),
            Projection::Scaled(factors) => Fill::ScaledLast(factors.clone()),
        };
        self.extend(dims::YEAR, &labels, &fill)
    }

    /// Sum labels of an axis by group, e.g. items into food groups.
    ///
    /// Every label on the axis must be assigned a group.
    pub fn group_sum(&self, axis: &str, groups: &IndexMap<Label, Label>) -> Result<Self> {
        self.try_map(|array| Ok(array.group_sum(axis, groups, None)?))
    }

    /// Multiply an element's selected cells by `scale`.
    ///
    /// Does not rebalance the sheet; see
    /// [`balanced_scaling`](crate::intervention::balanced_scaling) for that.
    pub fn scale_element(
        &self,
        element: Element,
        scale: &Scale,
        selection: &Selection,
    ) -> Result<Self> {
        let array = self.element(element)?;
        let mask = array.selection_mask(selection)?;
        let factors = scale.factors(array)?;
        let data = array
            .data()
            .iter()
            .zip(&factors)
            .zip(&mask)
            .map(|((&v, &f), &selected)| if selected { v * f } else { v })
            .collect();
        self.with_element(element, array.with_data(data)?)
    }

    /// Scale `from` and move the difference into `into`.
    ///
    /// With `add` the change is added to `into` (scaling food down lowers
    /// imports); without it the change is subtracted. NaN counts as zero
    /// when computing the difference. Does not check the identity.
    pub fn scale_add(
        &self,
        from: Element,
        into: Element,
        scale: &Scale,
        selection: &Selection,
        add: bool,
    ) -> Result<Self> {
        let target = self.element(into)?.clone();
        let scaled = self.scale_element(from, scale, selection)?;
        let before = self.element(from)?;
        let after = scaled.element(from)?;
        let sign = if add { -1.0 } else { 1.0 };

        let data = target
            .data()
            .iter()
            .zip(before.data().iter().zip(after.data()))
            .map(|(&t, (&old, &new))| {
                let dif = old.nan_to_zero() - new.nan_to_zero();
                if dif == 0.0 { t } else { t + sign * dif }
            })
            .collect();
        scaled.with_element(into, target.with_data(data)?)
    }
}

pub(crate) trait NanToZero {
    fn nan_to_zero(self) -> f64;
}

impl NanToZero for f64 {
    fn nan_to_zero(self) -> f64 {
        if self.is_nan() { 0.0 } else { self }
    }
}

pub(crate) fn describe(array: &LabeledArray, flat: usize) -> String {
    array
        .coords(flat)
        .into_iter()
        .map(|(axis, label)| format!("{axis}={label}"))
        .collect::<Vec<_>>()
        .join(", ")
}
