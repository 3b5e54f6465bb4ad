//! Balance sheet elements
//!
//! Every element has a fixed place in the accounting identity
//!
//! ```text
//! production + imports − exports + stock_change
//!     = food + feed + seed + processing + losses + other_uses + residual
//! ```
//!
//! `stock_change` counts withdrawals from stocks as supply, so it is positive
//! when stocks shrink. `domestic_supply` is the derived left-hand side and
//! takes no part in the identity itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side of the accounting identity an element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Supply,
    Utilization,
    /// Aggregates computed from other elements.
    Derived,
}

impl Side {
    /// The other side of the identity, if this side takes part in it.
    pub fn opposite(self) -> Option<Side> {
        match self {
            Side::Supply => Some(Side::Utilization),
            Side::Utilization => Some(Side::Supply),
            Side::Derived => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Supply => "supply",
            Side::Utilization => "utilization",
            Side::Derived => "derived",
        })
    }
}

/// Element category of a food balance sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Production,
    Imports,
    Exports,
    StockChange,
    Food,
    Feed,
    Seed,
    Processing,
    Losses,
    OtherUses,
    Residual,
    DomesticSupply,
}

impl Element {
    pub const ALL: [Element; 12] = [
        Element::Production,
        Element::Imports,
        Element::Exports,
        Element::StockChange,
        Element::Food,
        Element::Feed,
        Element::Seed,
        Element::Processing,
        Element::Losses,
        Element::OtherUses,
        Element::Residual,
        Element::DomesticSupply,
    ];

    pub fn side(self) -> Side {
        match self {
            Element::Production | Element::Imports | Element::Exports | Element::StockChange => {
                Side::Supply
            }
            Element::Food
            | Element::Feed
            | Element::Seed
            | Element::Processing
            | Element::Losses
            | Element::OtherUses
            | Element::Residual => Side::Utilization,
            Element::DomesticSupply => Side::Derived,
        }
    }

    /// Sign with which the element enters its side's total.
    pub fn coefficient(self) -> f64 {
        match self {
            Element::Exports => -1.0,
            Element::DomesticSupply => 0.0,
            _ => 1.0,
        }
    }

    /// Whether values may legitimately be negative.
    pub fn is_signed(self) -> bool {
        matches!(self, Element::StockChange | Element::Residual)
    }

    /// Element that absorbs a change to `self` when the side total is held
    /// constant.
    pub fn default_compensator(self) -> Option<Element> {
        match self {
            Element::Production => Some(Element::Imports),
            Element::Imports | Element::Exports => Some(Element::Production),
            Element::StockChange => Some(Element::Imports),
            Element::Food => Some(Element::OtherUses),
            Element::Feed
            | Element::Seed
            | Element::Processing
            | Element::Losses
            | Element::OtherUses
            | Element::Residual => Some(Element::Food),
            Element::DomesticSupply => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Element::Production => "production",
            Element::Imports => "imports",
            Element::Exports => "exports",
            Element::StockChange => "stock_change",
            Element::Food => "food",
            Element::Feed => "feed",
            Element::Seed => "seed",
            Element::Processing => "processing",
            Element::Losses => "losses",
            Element::OtherUses => "other_uses",
            Element::Residual => "residual",
            Element::DomesticSupply => "domestic_supply",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized element name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element: {0}")]
pub struct UnknownElement(pub String);

impl FromStr for Element {
    type Err = UnknownElement;

    /// Accepts snake_case names plus the spaced/capitalized spellings used
    /// in FAOSTAT exports ("Stock Variation", "Other uses (non-food)", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        let element = match normalized.as_str() {
            "production" => Element::Production,
            "imports" | "import_quantity" => Element::Imports,
            "exports" | "export_quantity" => Element::Exports,
            "stock_change" | "stock_variation" | "stock_changes" => Element::StockChange,
            "food" | "consumption" => Element::Food,
            "feed" => Element::Feed,
            "seed" => Element::Seed,
            "processing" => Element::Processing,
            "losses" | "waste" => Element::Losses,
            "other_uses" | "other_uses_(non_food)" => Element::OtherUses,
            "residual" | "residuals" => Element::Residual,
            "domestic_supply" | "domestic_supply_quantity" => Element::DomesticSupply,
            _ => return Err(UnknownElement(s.to_string())),
        };
        Ok(element)
    }
}
