//! Request file format
//!
//! ```json
//! {
//!   "input": {"loan_amnt": 12000, "home_ownership": "RENT"},
//!   "total_cfs": 3,
//!   "feature_ranges": {"loan_amnt": [3000, 10000], "term": ["36 months"]},
//!   "max_features_to_vary": 2,
//!   "categorical_weight": "auto"
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::args::Cli;
use crate::model::{AdditiveModel, FeatureType, FeatureValue};
use crate::pipeline::{CategoricalCost, CategoricalWeight, CfRequest, FeatureRange, Similarity};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRange {
    Bounds(f64, f64),
    Levels(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawWeight {
    Number(f64),
    Text(String),
}

/// Contents of a request file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFile {
    /// Input row keyed by feature name
    pub input: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub total_cfs: Option<usize>,
    #[serde(default)]
    pub target_range: Option<(f64, f64)>,
    #[serde(default)]
    feature_ranges: HashMap<String, RawRange>,
    #[serde(default)]
    pub features_to_vary: Option<Vec<String>>,
    #[serde(default)]
    pub max_features_to_vary: Option<usize>,
    #[serde(default)]
    pub continuous_integer_features: Vec<String>,
    #[serde(default)]
    categorical_weight: Option<RawWeight>,
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    #[serde(default)]
    pub similarity_factor: Option<f64>,
    #[serde(default)]
    pub prune_dominated: Option<bool>,
}

impl RequestFile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid request file")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("In {}", path.display()))
    }

    /// Input row in model order
    pub fn row<M: AdditiveModel + ?Sized>(&self, model: &M) -> Result<Vec<FeatureValue>> {
        model
            .features()
            .iter()
            .filter(|f| !f.is_interaction())
            .map(|feature| {
                let value = self
                    .input
                    .get(&feature.name)
                    .with_context(|| format!("Input has no value for feature '{}'", feature.name))?;
                to_feature_value(&feature.name, feature.feature_type(), value)
            })
            .collect()
    }

    /// Library request described by this file
    pub fn to_request(&self) -> Result<CfRequest> {
        let mut request = CfRequest::new(self.total_cfs.unwrap_or(1));
        request.target_range = self.target_range;
        request.features_to_vary = self.features_to_vary.clone();
        request.max_features_to_vary = self.max_features_to_vary;
        request.continuous_integer_features = self.continuous_integer_features.clone();

        for (name, range) in &self.feature_ranges {
            let range = match range {
                RawRange::Bounds(min, max) => FeatureRange::Continuous { min: *min, max: *max },
                RawRange::Levels(levels) => FeatureRange::Categorical(levels.clone()),
            };
            request.feature_ranges.insert(name.clone(), range);
        }

        if let Some(weight) = &self.categorical_weight {
            request.categorical_weight = match weight {
                RawWeight::Number(w) => CategoricalWeight::Fixed(*w),
                RawWeight::Text(s) => s.parse().map_err(anyhow::Error::msg)?,
            };
        }

        if let Some(threshold) = self.similarity_threshold {
            request.similarity = Similarity::Threshold(threshold);
        } else if let Some(factor) = self.similarity_factor {
            request.similarity = Similarity::Factor(factor);
        }

        if let Some(prune) = self.prune_dominated {
            request.prune_dominated = prune;
        }

        Ok(request)
    }
}

/// Apply command-line overrides to a request
pub fn apply_cli_overrides(mut request: CfRequest, cli: &Cli) -> CfRequest {
    if let Some(total) = cli.total_cfs {
        request.total_cfs = total;
    }
    if let Some(max) = cli.max_features_to_vary {
        request.max_features_to_vary = Some(max);
    }
    if let Some(similarity) = cli.similarity() {
        request.similarity = similarity;
    }
    if let Some(weight) = cli.categorical_weight {
        request.categorical_weight = weight;
    }
    request.verbose = !cli.quiet;
    request
}

/// Categorical cost mode selected on the command line
pub fn categorical_cost(cli: &Cli) -> CategoricalCost {
    if cli.flat_categorical_cost {
        CategoricalCost::Flat
    } else {
        CategoricalCost::Frequency
    }
}

fn to_feature_value(name: &str, feature_type: FeatureType, value: &serde_json::Value) -> Result<FeatureValue> {
    use serde_json::Value;

    match (feature_type, value) {
        (FeatureType::Continuous, Value::Number(n)) => match n.as_f64() {
            Some(x) => Ok(FeatureValue::Number(x)),
            None => bail!("Value of '{}' is not a finite number", name),
        },
        (FeatureType::Continuous, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(FeatureValue::Number)
            .with_context(|| format!("Value '{}' of '{}' is not a number", s, name)),
        (FeatureType::Categorical, Value::String(s)) => Ok(FeatureValue::Level(s.clone())),
        (FeatureType::Categorical, Value::Number(n)) => Ok(FeatureValue::Level(n.to_string())),
        (FeatureType::Categorical, Value::Bool(b)) => Ok(FeatureValue::Level(b.to_string())),
        _ => bail!("Value {} of '{}' does not fit a {} feature", value, name, feature_type),
    }
}
