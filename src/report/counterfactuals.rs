//! Counterfactual results
//!
//! `ResultProjector` maps the active variables of a round back onto the
//! input row and describes every change in feature terms.

use serde::Serialize;

use crate::model::{AdditiveModel, FeatureValue};
use crate::pipeline::catalog::{CfDirection, OptionCatalog};
use crate::pipeline::solver::{ModelSize, RoundSolution, VariableKey};

/// One changed feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureChange {
    pub feature: String,
    pub from: FeatureValue,
    pub to: FeatureValue,
    /// Bin the new value falls into, e.g. `[3000, 5000)` or a level
    pub target_bin: String,
    pub score_gain: f64,
    pub distance: f64,
}

/// An interaction term whose score moved because both constituents changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionTrigger {
    pub feature: String,
    pub bins: (String, String),
    pub score_gain: f64,
}

/// One strategy: a modified row plus what changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counterfactual {
    pub row: Vec<FeatureValue>,
    pub changes: Vec<FeatureChange>,
    pub interactions: Vec<InteractionTrigger>,
    /// Total distance of the strategy
    pub objective: f64,
    pub score_gain: f64,
    pub active: Vec<VariableKey>,
}

impl Counterfactual {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Builds `Counterfactual`s from round solutions
pub struct ResultProjector<'a, M: AdditiveModel + ?Sized> {
    model: &'a M,
    catalog: &'a OptionCatalog,
    original_row: &'a [FeatureValue],
}

impl<'a, M: AdditiveModel + ?Sized> ResultProjector<'a, M> {
    pub fn new(model: &'a M, catalog: &'a OptionCatalog, original_row: &'a [FeatureValue]) -> Self {
        Self {
            model,
            catalog,
            original_row,
        }
    }

    pub fn project(&self, solution: &RoundSolution) -> Counterfactual {
        let mut row = self.original_row.to_vec();
        let mut changes = Vec::new();
        let mut interactions = Vec::new();

        for variable in &solution.active {
            match variable.key {
                VariableKey::Main { feature, bin } => {
                    let Some(option) = self.catalog.main_option(feature, bin) else {
                        continue;
                    };
                    let spec = self.model.feature(feature);
                    let target_bin = spec
                        .main_effect()
                        .map(|(axis, _)| axis.describe_bin(bin))
                        .unwrap_or_default();

                    changes.push(FeatureChange {
                        feature: spec.name.clone(),
                        from: self.original_row[feature.0].clone(),
                        to: option.target.clone(),
                        target_bin,
                        score_gain: option.score_gain,
                        distance: option.distance,
                    });
                    row[feature.0] = option.target.clone();
                }
                VariableKey::Interaction { feature, bins } => {
                    let spec = self.model.feature(feature);
                    let Some(term) = spec.interaction_term() else {
                        continue;
                    };
                    let joint_bins = self
                        .catalog
                        .interaction_option(feature, bins)
                        .and_then(|o| o.joint_bins);
                    let described = match joint_bins {
                        Some((a, b)) => (term.first_axis.describe_bin(a), term.second_axis.describe_bin(b)),
                        None => (bins.0.to_string(), bins.1.to_string()),
                    };
                    interactions.push(InteractionTrigger {
                        feature: spec.name.clone(),
                        bins: described,
                        score_gain: variable.score_gain,
                    });
                }
            }
        }

        Counterfactual {
            row,
            changes,
            interactions,
            objective: solution.objective,
            score_gain: solution.score_gain,
            active: solution.active.iter().map(|v| v.key).collect(),
        }
    }
}

/// Everything `generate_cfs` found
#[derive(Debug, Clone, Serialize)]
pub struct Counterfactuals {
    pub solutions: Vec<Counterfactual>,
    /// False if any round was infeasible
    pub success: bool,
    pub requested: usize,
    #[serde(skip)]
    pub catalog: OptionCatalog,
    pub direction: CfDirection,
    pub needed_score_gain: f64,
    pub original_row: Vec<FeatureValue>,
    pub model_size: ModelSize,
}

impl Counterfactuals {
    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Modified rows, one per strategy
    pub fn to_rows(&self) -> Vec<Vec<FeatureValue>> {
        self.solutions.iter().map(|s| s.row.clone()).collect()
    }

    /// Model predictions for every modified row
    pub fn new_predictions<M: AdditiveModel + ?Sized>(&self, model: &M) -> Vec<f64> {
        self.solutions.iter().map(|s| model.predict(&s.row)).collect()
    }
}
