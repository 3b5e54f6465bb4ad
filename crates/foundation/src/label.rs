//! Axis labels
//!
//! Coordinates along an axis are either integer codes (item codes, years)
//! or free text (region names, item names). Both forms serialize untagged so
//! `2731`, `2020` and `"UK"` round-trip unchanged through JSON and YAML.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single coordinate label on an [`Axis`](crate::Axis).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    /// Integer code, e.g. a FAOSTAT item code or a calendar year.
    Int(i64),
    /// Text identifier, e.g. `"UK"`.
    Text(String),
}

impl Label {
    /// Integer value of this label, if it is an integer label.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Label::Int(v) => Some(*v),
            Label::Text(_) => None,
        }
    }

    /// Text value of this label, if it is a text label.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Label::Int(_) => None,
            Label::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{v}"),
            Label::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Label::Int(v)
    }
}

impl From<i32> for Label {
    fn from(v: i32) -> Self {
        Label::Int(i64::from(v))
    }
}

impl From<u32> for Label {
    fn from(v: u32) -> Self {
        Label::Int(i64::from(v))
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Text(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Text(s)
    }
}

impl From<&Label> for Label {
    fn from(l: &Label) -> Self {
        l.clone()
    }
}

/// Integers parse as [`Label::Int`], anything else as [`Label::Text`].
impl FromStr for Label {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(Label::Int)
            .unwrap_or_else(|_| Label::Text(s.to_string())))
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

impl PartialEq<i64> for Label {
    fn eq(&self, other: &i64) -> bool {
        self.as_int() == Some(*other)
    }
}

/// Convert any iterable of label-like values into a `Vec<Label>`.
pub fn labels<I, L>(values: I) -> Vec<Label>
where
    I: IntoIterator<Item = L>,
    L: Into<Label>,
{
    values.into_iter().map(Into::into).collect()
}
