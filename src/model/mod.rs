//! Additive model collaborator
//!
//! The counterfactual search never trains or evaluates arbitrary models. It
//! consumes an [`AdditiveModel`]: an ordered list of binned features with
//! per-bin additive scores, a local explanation that decomposes the score of
//! one input row, and a prediction function.

pub mod bins;
mod gam;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use bins::{locate, BinAxis};
pub use gam::Gam;

/// Index of a feature in the model's ordered feature list.
///
/// Main-effect features come first, so for a main feature the id is also the
/// column of its value in an input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FeatureId(pub usize);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single cell of an input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Level(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(x) => Some(*x),
            FeatureValue::Level(_) => None,
        }
    }

    pub fn as_level(&self) -> Option<&str> {
        match self {
            FeatureValue::Level(level) => Some(level),
            FeatureValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(x) => write!(f, "{}", x),
            FeatureValue::Level(level) => write!(f, "\"{}\"", level),
        }
    }
}

/// Whether the model classifies (binary, logit score) or regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    Classifier,
    /// Regressors always need an explicit target range.
    Regressor,
}

/// Feature type for option generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeatureType {
    Continuous,
    Categorical,
    Interaction,
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureType::Continuous => write!(f, "continuous"),
            FeatureType::Categorical => write!(f, "categorical"),
            FeatureType::Interaction => write!(f, "interaction"),
        }
    }
}

/// Pairwise interaction term: a 2-D score table over its own bin axes.
///
/// The axes may bin the constituent features differently from their main
/// effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionTerm {
    pub first: FeatureId,
    pub second: FeatureId,
    pub first_axis: BinAxis,
    pub second_axis: BinAxis,
    /// `scores[bin_first][bin_second]`
    pub scores: Vec<Vec<f64>>,
}

impl InteractionTerm {
    /// Joint score at a pair of interaction bins
    pub fn score_at(&self, first_bin: usize, second_bin: usize) -> f64 {
        self.scores
            .get(first_bin)
            .and_then(|row| row.get(second_bin))
            .copied()
            .unwrap_or(0.0)
    }

    /// Locate both values on the interaction axes. `None` if either side is
    /// an unseen level.
    pub fn locate(&self, first: &FeatureValue, second: &FeatureValue) -> Option<(usize, usize)> {
        Some((self.first_axis.locate(first)?, self.second_axis.locate(second)?))
    }

    /// Joint score for a pair of raw values; unseen levels score zero.
    pub fn score_for(&self, first: &FeatureValue, second: &FeatureValue) -> f64 {
        self.locate(first, second)
            .map(|(a, b)| self.score_at(a, b))
            .unwrap_or(0.0)
    }

    /// The other constituent of this interaction, if `id` is one of them
    pub fn partner_of(&self, id: FeatureId) -> Option<FeatureId> {
        if id == self.first {
            Some(self.second)
        } else if id == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FeatureKind {
    /// Continuous (left bin edges) or categorical (levels) main effect
    Main { axis: BinAxis, scores: Vec<f64> },
    Interaction(InteractionTerm),
}

/// One feature of an additive model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureKind,
}

impl Feature {
    pub fn continuous(name: impl Into<String>, bin_starts: Vec<f64>, scores: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Main {
                axis: BinAxis::Continuous(bin_starts),
                scores,
            },
        }
    }

    pub fn categorical(name: impl Into<String>, levels: Vec<String>, scores: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Main {
                axis: BinAxis::Categorical(levels),
                scores,
            },
        }
    }

    pub fn interaction(name: impl Into<String>, term: InteractionTerm) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Interaction(term),
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        match &self.kind {
            FeatureKind::Main {
                axis: BinAxis::Continuous(_),
                ..
            } => FeatureType::Continuous,
            FeatureKind::Main {
                axis: BinAxis::Categorical(_),
                ..
            } => FeatureType::Categorical,
            FeatureKind::Interaction(_) => FeatureType::Interaction,
        }
    }

    pub fn is_interaction(&self) -> bool {
        matches!(self.kind, FeatureKind::Interaction(_))
    }

    /// Bin axis and per-bin scores of a main effect
    pub fn main_effect(&self) -> Option<(&BinAxis, &[f64])> {
        match &self.kind {
            FeatureKind::Main { axis, scores } => Some((axis, scores.as_slice())),
            FeatureKind::Interaction(_) => None,
        }
    }

    pub fn interaction_term(&self) -> Option<&InteractionTerm> {
        match &self.kind {
            FeatureKind::Interaction(term) => Some(term),
            FeatureKind::Main { .. } => None,
        }
    }

    /// Max minus min additive score (main effects only)
    pub fn score_range(&self) -> Option<f64> {
        let (_, scores) = self.main_effect()?;
        if scores.is_empty() {
            return None;
        }
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        Some(max - min)
    }

    /// Additive score of a value for a main effect; unseen levels score zero.
    pub fn score_of(&self, value: &FeatureValue) -> f64 {
        match self.main_effect() {
            Some((axis, scores)) => axis
                .locate(value)
                .and_then(|bin| scores.get(bin).copied())
                .unwrap_or(0.0),
            None => 0.0,
        }
    }
}

/// Decomposition of the model score for one input row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalExplanation {
    pub intercept: f64,
    /// One contribution per model feature (interactions included), in model order
    pub contributions: Vec<f64>,
}

impl LocalExplanation {
    pub fn total(&self) -> f64 {
        self.intercept + self.contributions.iter().sum::<f64>()
    }
}

/// Logistic link for classifiers
pub fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// The model collaborator consumed by the counterfactual search.
///
/// Implementors must list main-effect features before interaction terms; an
/// input row holds one value per main-effect feature, in order.
pub trait AdditiveModel {
    fn features(&self) -> &[Feature];

    fn intercept(&self) -> f64;

    fn kind(&self) -> ModelKind;

    /// Per-feature score decomposition of `row`
    fn explain_local(&self, row: &[FeatureValue]) -> LocalExplanation;

    /// Raw additive score (logit for classifiers)
    fn predict_score(&self, row: &[FeatureValue]) -> f64 {
        self.explain_local(row).total()
    }

    /// Class label (0 or 1) for classifiers, numeric prediction for regressors
    fn predict(&self, row: &[FeatureValue]) -> f64 {
        let score = self.predict_score(row);
        match self.kind() {
            ModelKind::Classifier => {
                if sigmoid(score) >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ModelKind::Regressor => score,
        }
    }

    fn feature_id(&self, name: &str) -> Option<FeatureId> {
        self.features()
            .iter()
            .position(|f| f.name == name)
            .map(FeatureId)
    }

    fn feature(&self, id: FeatureId) -> &Feature {
        &self.features()[id.0]
    }

    fn main_feature_count(&self) -> usize {
        self.features().iter().filter(|f| !f.is_interaction()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_type_and_range() {
        let f = Feature::continuous("age", vec![0.0, 30.0, 60.0], vec![-0.5, 0.1, 0.7]);
        assert_eq!(f.feature_type(), FeatureType::Continuous);
        assert!((f.score_range().unwrap() - 1.2).abs() < 1e-12);

        let c = Feature::categorical("home", vec!["RENT".into(), "OWN".into()], vec![0.2, -0.1]);
        assert_eq!(c.feature_type(), FeatureType::Categorical);
        assert_eq!(c.score_of(&FeatureValue::Level("OWN".into())), -0.1);
        assert_eq!(c.score_of(&FeatureValue::Level("MORTGAGE".into())), 0.0);
    }

    #[test]
    fn test_interaction_partner() {
        let term = InteractionTerm {
            first: FeatureId(0),
            second: FeatureId(2),
            first_axis: BinAxis::Continuous(vec![0.0, 1.0]),
            second_axis: BinAxis::Categorical(vec!["a".into()]),
            scores: vec![vec![0.1], vec![0.3]],
        };
        assert_eq!(term.partner_of(FeatureId(0)), Some(FeatureId(2)));
        assert_eq!(term.partner_of(FeatureId(2)), Some(FeatureId(0)));
        assert_eq!(term.partner_of(FeatureId(1)), None);
        assert_eq!(
            term.score_for(&FeatureValue::Number(5.0), &FeatureValue::Level("a".into())),
            0.3
        );
        assert_eq!(
            term.score_for(&FeatureValue::Number(5.0), &FeatureValue::Level("b".into())),
            0.0
        );
    }

    #[test]
    fn test_feature_value_untagged_json() {
        let values: Vec<FeatureValue> = serde_json::from_str(r#"[1.5, "RENT"]"#).unwrap();
        assert_eq!(values[0], FeatureValue::Number(1.5));
        assert_eq!(values[1], FeatureValue::Level("RENT".into()));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(5.0) > 0.99);
        assert!(sigmoid(-5.0) < 0.01);
    }
}
