//! Intervention type definitions and loading.

use std::path::{Path, PathBuf};

use agrifood_foundation::Selection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::element::Element;
use crate::intervention::{BalancedScaling, balanced_scaling};
use crate::metrics::Metric;
use crate::scale::{Adoption, Scale};
use crate::sheet::FoodBalanceSheet;

pub const API_VERSION: &str = "agrifood/v1";
pub const KIND: &str = "Intervention";

/// Errors that can occur when loading or validating an intervention.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Failed to read the intervention file.
    #[error("failed to read intervention file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the intervention YAML.
    #[error("failed to parse intervention YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid apiVersion: expected 'agrifood/v1', got '{0}'")]
    InvalidApiVersion(String),

    #[error("invalid kind: expected 'Intervention', got '{0}'")]
    InvalidKind(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    /// A step with a negative or non-finite scale.
    #[error("step {step}: invalid scale {value}")]
    InvalidStep { step: usize, value: f64 },
}

/// Result type for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// A named sequence of balanced scaling steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    /// API version for compatibility checking.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind must be "Intervention".
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: InterventionMetadata,

    /// Steps applied in order.
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Indicators to report after applying the steps.
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

/// Metadata for an intervention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionMetadata {
    /// Machine identifier (lowercase, no spaces).
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

/// One balanced scaling call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub origin: Element,

    /// Final scale; reached gradually when `adoption` is set.
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub constant: bool,

    /// Explicit targets; defaults apply when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Element>,

    /// Absorbs what the targets cannot without going negative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Element>,

    #[serde(default, skip_serializing_if = "Selection::is_all")]
    pub select: Selection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adoption: Option<Adoption>,
}

impl Step {
    pub fn new(origin: Element, scale: f64) -> Self {
        Self {
            origin,
            scale,
            constant: false,
            targets: Vec::new(),
            fallback: None,
            select: Selection::all(),
            adoption: None,
        }
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Element>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn with_fallback(mut self, fallback: Element) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_select(mut self, select: Selection) -> Self {
        self.select = select;
        self
    }

    pub fn with_adoption(mut self, adoption: Adoption) -> Self {
        self.adoption = Some(adoption);
        self
    }

    /// Balanced scaling parameters for this step on a given sheet.
    ///
    /// With an adoption curve the scale becomes a `Year` array spanning the
    /// sheet's years.
    pub fn to_params(&self, sheet: &FoodBalanceSheet) -> crate::Result<BalancedScaling> {
        let scale = match &self.adoption {
            Some(adoption) => adoption.scale_for(sheet.years(), self.scale)?,
            None => Scale::Uniform(self.scale),
        };
        let params = BalancedScaling::new(self.origin, scale)
            .with_selection(self.select.clone())
            .with_targets(self.targets.iter().copied())
            .with_constant(self.constant);
        Ok(match self.fallback {
            Some(fallback) => params.with_fallback(fallback),
            None => params,
        })
    }
}

impl Intervention {
    /// Create an empty intervention with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: InterventionMetadata {
                name: name.into(),
                title: None,
                description: None,
            },
            steps: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// Load an intervention from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ScenarioResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse an intervention from a YAML string.
    pub fn from_yaml(yaml: &str) -> ScenarioResult<Self> {
        let intervention: Intervention = serde_yaml::from_str(yaml)?;
        intervention.validate_schema()?;
        Ok(intervention)
    }

    pub fn to_yaml(&self) -> ScenarioResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the envelope and step parameters.
    pub fn validate_schema(&self) -> ScenarioResult<()> {
        if self.api_version != API_VERSION {
            return Err(ScenarioError::InvalidApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(ScenarioError::InvalidKind(self.kind.clone()));
        }
        if self.metadata.name.is_empty() {
            return Err(ScenarioError::MissingField("metadata.name".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::MissingField("steps".to_string()));
        }
        for (step, s) in self.steps.iter().enumerate() {
            if !s.scale.is_finite() || s.scale < 0.0 {
                return Err(ScenarioError::InvalidStep {
                    step,
                    value: s.scale,
                });
            }
        }
        Ok(())
    }

    /// Apply every step in order.
    ///
    /// Stops at the first failing step; the input sheet is never modified.
    pub fn apply(&self, sheet: &FoodBalanceSheet) -> crate::Result<FoodBalanceSheet> {
        let mut current = sheet.clone();
        for (index, step) in self.steps.iter().enumerate() {
            let params = step.to_params(&current)?;
            current = balanced_scaling(&current, &params)?;
            debug!(
                intervention = %self.metadata.name,
                step = index,
                origin = %step.origin,
                "step applied"
            );
        }
        Ok(current)
    }

    /// Builder method: append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Builder method: add a reported metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Builder method: set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    /// Builder method: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }
}

/// Find intervention files in a directory.
///
/// Every `.yaml`/`.yml` file directly inside `dir` is a candidate, sorted by
/// path.
pub fn find_scenarios(dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Vec::new();
    }

    let mut scenarios = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
                scenarios.push(path);
            }
        }
    }
    scenarios.sort();
    scenarios
}

/// Load all interventions from a directory, keyed by name.
///
/// Files that fail to load are skipped with a warning.
pub fn load_scenarios(dir: impl AsRef<Path>) -> IndexMap<String, Intervention> {
    let mut scenarios = IndexMap::new();
    for path in find_scenarios(dir) {
        match Intervention::load(&path) {
            Ok(intervention) => {
                scenarios.insert(intervention.metadata.name.clone(), intervention);
            }
            Err(e) => {
                warn!("Failed to load intervention from {:?}: {}", path, e);
            }
        }
    }
    scenarios
}
