//! Option catalog: every candidate change the optimizer may pick
//!
//! The catalog is built once per `generate_cfs` call and stays read-only for
//! all diverse-solution rounds; later rounds exclude options by muting their
//! variables instead of rebuilding the catalog.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{FeatureId, FeatureType, FeatureValue};

/// Direction the total score must move to reach the desired prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CfDirection {
    Increase,
    Decrease,
}

impl CfDirection {
    /// `+1.0` or `-1.0`
    pub fn sign(self) -> f64 {
        match self {
            CfDirection::Increase => 1.0,
            CfDirection::Decrease => -1.0,
        }
    }

    /// Whether a total score gain meets the goal `needed`
    pub fn is_satisfied(self, score_gain: f64, needed: f64) -> bool {
        match self {
            CfDirection::Increase => score_gain >= needed,
            CfDirection::Decrease => score_gain <= needed,
        }
    }
}

impl std::fmt::Display for CfDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CfDirection::Increase => write!(f, "+1"),
            CfDirection::Decrease => write!(f, "-1"),
        }
    }
}

/// Score movement of one interaction term caused by a main-effect option
/// alone, with the partner feature held at its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOffset {
    pub interaction: FeatureId,
    pub score_gain: f64,
}

/// Candidate new value for a continuous or categorical feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainOption {
    pub target: FeatureValue,
    /// Signed gain relative to the current score, interaction offsets included
    pub score_gain: f64,
    pub distance: f64,
    /// Main-effect bin (or level index) of `target`
    pub bin: usize,
    pub interaction_offsets: Vec<InteractionOffset>,
}

impl MainOption {
    /// Offset already attributed to this option for `interaction`
    pub fn offset_for(&self, interaction: FeatureId) -> f64 {
        self.interaction_offsets
            .iter()
            .filter(|o| o.interaction == interaction)
            .map(|o| o.score_gain)
            .sum()
    }
}

/// Joint change of both constituents of an interaction term.
///
/// Its cost is already paid by the two main-effect options, so it only
/// carries the de-duplicated score correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOption {
    pub targets: (FeatureValue, FeatureValue),
    pub score_gain: f64,
    /// Main-effect bins of the two constituent options
    pub bins: (usize, usize),
    /// Bins on the interaction's own axes, when both targets are known levels
    pub joint_bins: Option<(usize, usize)>,
}

impl InteractionOption {
    pub fn distance(&self) -> f64 {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
struct MainEntry {
    feature_type: FeatureType,
    options: Vec<MainOption>,
}

#[derive(Debug, Clone, Serialize)]
struct InteractionEntry {
    constituents: (FeatureId, FeatureId),
    options: Vec<InteractionOption>,
}

/// Options keyed by feature
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptionCatalog {
    main: BTreeMap<FeatureId, MainEntry>,
    interactions: BTreeMap<FeatureId, InteractionEntry>,
}

impl OptionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_main(&mut self, feature: FeatureId, feature_type: FeatureType, options: Vec<MainOption>) {
        self.main.insert(
            feature,
            MainEntry {
                feature_type,
                options,
            },
        );
    }

    pub fn insert_interaction(
        &mut self,
        feature: FeatureId,
        constituents: (FeatureId, FeatureId),
        options: Vec<InteractionOption>,
    ) {
        self.interactions.insert(
            feature,
            InteractionEntry {
                constituents,
                options,
            },
        );
    }

    pub fn main_options(&self, feature: FeatureId) -> &[MainOption] {
        self.main
            .get(&feature)
            .map(|e| e.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn interaction_options(&self, feature: FeatureId) -> &[InteractionOption] {
        self.interactions
            .get(&feature)
            .map(|e| e.options.as_slice())
            .unwrap_or(&[])
    }

    /// The option of `feature` that targets main-effect bin `bin`
    pub fn main_option(&self, feature: FeatureId, bin: usize) -> Option<&MainOption> {
        self.main_options(feature).iter().find(|o| o.bin == bin)
    }

    pub fn interaction_option(&self, feature: FeatureId, bins: (usize, usize)) -> Option<&InteractionOption> {
        self.interaction_options(feature).iter().find(|o| o.bins == bins)
    }

    pub fn main_features(&self) -> impl Iterator<Item = (FeatureId, &[MainOption])> {
        self.main.iter().map(|(id, e)| (*id, e.options.as_slice()))
    }

    /// `(interaction, constituents, options)` for every expanded interaction
    pub fn interaction_features(
        &self,
    ) -> impl Iterator<Item = (FeatureId, (FeatureId, FeatureId), &[InteractionOption])> {
        self.interactions
            .iter()
            .map(|(id, e)| (*id, e.constituents, e.options.as_slice()))
    }

    pub fn main_option_count(&self) -> usize {
        self.main.values().map(|e| e.options.len()).sum()
    }

    pub fn interaction_option_count(&self) -> usize {
        self.interactions.values().map(|e| e.options.len()).sum()
    }

    /// Keep only the options of `feature` matching `keep`
    pub fn retain_main<F>(&mut self, feature: FeatureId, keep: F)
    where
        F: FnMut(&MainOption) -> bool,
    {
        if let Some(entry) = self.main.get_mut(&feature) {
            entry.options.retain(keep);
        }
    }

    /// Weight that makes the mean categorical distance equal the mean
    /// continuous distance. Falls back to 1 when either side has no options
    /// or the categorical mean is zero.
    pub fn auto_categorical_weight(&self) -> f64 {
        let mean_of = |wanted: FeatureType| -> Option<f64> {
            let distances: Vec<f64> = self
                .main
                .values()
                .filter(|e| e.feature_type == wanted)
                .flat_map(|e| e.options.iter().map(|o| o.distance))
                .collect();
            if distances.is_empty() {
                None
            } else {
                Some(distances.iter().sum::<f64>() / distances.len() as f64)
            }
        };

        match (mean_of(FeatureType::Continuous), mean_of(FeatureType::Categorical)) {
            (Some(cont), Some(cat)) if cat > 0.0 && cont.is_finite() => cont / cat,
            _ => 1.0,
        }
    }

    /// Multiply every categorical option distance by `weight`
    pub fn scale_categorical_distances(&mut self, weight: f64) {
        for entry in self
            .main
            .values_mut()
            .filter(|e| e.feature_type == FeatureType::Categorical)
        {
            for option in &mut entry.options {
                option.distance *= weight;
            }
        }
    }
}
