//! Agrifood Run
//!
//! Support code for the `agrifood-run` binary: logging setup, sheet files
//! and report formatting.

use std::path::Path;

use agrifood_food::{FoodBalanceSheet, Outcome};
use agrifood_foundation::LabeledArray;
use anyhow::{Context, bail};
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,agrifood_food=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}

enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> anyhow::Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml" | "yml") => Ok(Format::Yaml),
        _ => bail!(
            "cannot tell sheet format of '{}': expected .json, .yaml or .yml",
            path.display()
        ),
    }
}

/// Read a sheet from a JSON or YAML file, chosen by extension.
pub fn read_sheet(path: &Path) -> anyhow::Result<FoodBalanceSheet> {
    let format = format_of(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sheet '{}'", path.display()))?;
    let sheet = match format {
        Format::Json => serde_json::from_str(&content)
            .with_context(|| format!("invalid sheet '{}'", path.display()))?,
        Format::Yaml => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid sheet '{}'", path.display()))?,
    };
    Ok(sheet)
}

/// Write a sheet as JSON or YAML, chosen by extension.
pub fn write_sheet(path: &Path, sheet: &FoodBalanceSheet) -> anyhow::Result<()> {
    let content = match format_of(path)? {
        Format::Json => serde_json::to_string_pretty(sheet)?,
        Format::Yaml => serde_yaml::to_string(sheet)?,
    };
    std::fs::write(path, content)
        .with_context(|| format!("failed to write sheet '{}'", path.display()))
}

/// One line per cell: `Item=2731, Year=2020  0.9091`.
pub fn format_rows(array: &LabeledArray) -> Vec<String> {
    array
        .data()
        .iter()
        .enumerate()
        .map(|(flat, value)| {
            let coords = array
                .coords(flat)
                .into_iter()
                .map(|(axis, label)| format!("{axis}={label}"))
                .collect::<Vec<_>>()
                .join(", ");
            if value.is_nan() {
                format!("{coords}  n/a")
            } else {
                format!("{coords}  {value:.4}")
            }
        })
        .collect()
}

/// Human-readable summary of a batch comparison.
pub fn format_outcomes(outcomes: &[Outcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        match &outcome.sheet {
            Ok(_) => out.push_str(&format!("{}: ok\n", outcome.name)),
            Err(e) => out.push_str(&format!("{}: failed: {}\n", outcome.name, e)),
        }
        for (metric, values) in &outcome.metrics {
            match values {
                Ok(values) => {
                    for row in format_rows(values) {
                        out.push_str(&format!("  {metric} {row}\n"));
                    }
                }
                Err(e) => out.push_str(&format!("  {metric} unavailable: {e}\n")),
            }
        }
    }
    out
}
