//! Counterfactual generation entry point
//!
//! `GamCoach::generate_cfs` validates a request, builds the option catalog
//! once, then hands it to the diverse-solution controller.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{CfDirection, OptionCatalog};
use super::interaction::expand_interaction;
use super::options::{
    default_similarity_threshold, generate_categorical_options, generate_continuous_options, FeatureRange,
    OptionContext,
};
use super::reference::ReferenceStats;
use super::solver::{DiverseSolutionController, ModelSize, OptimizationModelBuilder, RoundOutcome};
use crate::error::{CoachError, Result};
use crate::model::{AdditiveModel, FeatureId, FeatureType, FeatureValue, ModelKind};
use crate::report::{Counterfactuals, ResultProjector};
use crate::utils::progress::create_progress_bar;

/// Default fraction of the mean continuous score range used as the
/// similarity threshold
pub const DEFAULT_SIMILARITY_FACTOR: f64 = 0.005;

/// Amount by which a class-1 score must fall below 0
pub const CLASS_FLIP_MARGIN: f64 = 1e-6;

/// Scale applied to categorical distances
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub enum CategoricalWeight {
    /// Match the mean categorical distance to the mean continuous distance
    #[default]
    Auto,
    Fixed(f64),
}

impl std::fmt::Display for CategoricalWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoricalWeight::Auto => write!(f, "auto"),
            CategoricalWeight::Fixed(w) => write!(f, "{}", w),
        }
    }
}

impl std::str::FromStr for CategoricalWeight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(CategoricalWeight::Auto);
        }
        match s.parse::<f64>() {
            Ok(w) if w.is_finite() && w > 0.0 => Ok(CategoricalWeight::Fixed(w)),
            _ => Err(format!(
                "Invalid categorical weight: '{}'. Use 'auto' or a positive number.",
                s
            )),
        }
    }
}

/// How the option similarity threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Similarity {
    /// Fraction of the mean additive-score range of continuous features
    Factor(f64),
    /// Absolute score-gain threshold
    Threshold(f64),
}

impl Default for Similarity {
    fn default() -> Self {
        Similarity::Factor(DEFAULT_SIMILARITY_FACTOR)
    }
}

impl std::fmt::Display for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Similarity::Factor(factor) => write!(f, "{} x score range", factor),
            Similarity::Threshold(threshold) => write!(f, "{}", threshold),
        }
    }
}

/// Constraints and settings for one `generate_cfs` call
#[derive(Debug, Clone, Serialize)]
pub struct CfRequest {
    pub total_cfs: usize,
    /// Desired prediction interval (regression only)
    pub target_range: Option<(f64, f64)>,
    pub feature_ranges: HashMap<String, FeatureRange>,
    /// Features allowed to change; all main effects when `None`
    pub features_to_vary: Option<Vec<String>>,
    pub max_features_to_vary: Option<usize>,
    pub continuous_integer_features: Vec<String>,
    pub categorical_weight: CategoricalWeight,
    pub similarity: Similarity,
    /// Drop unhelpful and near-duplicate options
    pub prune_dominated: bool,
    /// Show a progress bar over rounds
    pub verbose: bool,
}

impl Default for CfRequest {
    fn default() -> Self {
        Self {
            total_cfs: 1,
            target_range: None,
            feature_ranges: HashMap::new(),
            features_to_vary: None,
            max_features_to_vary: None,
            continuous_integer_features: Vec::new(),
            categorical_weight: CategoricalWeight::Auto,
            similarity: Similarity::default(),
            prune_dominated: true,
            verbose: false,
        }
    }
}

impl CfRequest {
    pub fn new(total_cfs: usize) -> Self {
        Self {
            total_cfs,
            ..Default::default()
        }
    }

    pub fn with_target_range(mut self, min: f64, max: f64) -> Self {
        self.target_range = Some((min, max));
        self
    }

    pub fn with_feature_range(mut self, feature: impl Into<String>, range: FeatureRange) -> Self {
        self.feature_ranges.insert(feature.into(), range);
        self
    }

    pub fn with_features_to_vary<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features_to_vary = Some(features.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_features_to_vary(mut self, max: usize) -> Self {
        self.max_features_to_vary = Some(max);
        self
    }

    pub fn with_integer_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.continuous_integer_features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categorical_weight(mut self, weight: CategoricalWeight) -> Self {
        self.categorical_weight = weight;
        self
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune_dominated = prune;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Direction, threshold and per-option bound derived from the current
/// prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchGoal {
    pub direction: CfDirection,
    pub needed_score_gain: f64,
    pub score_gain_bound: Option<f64>,
}

/// Request after name resolution
struct ResolvedRequest {
    features_to_vary: BTreeSet<FeatureId>,
    integer_features: BTreeSet<FeatureId>,
    feature_ranges: Vec<(FeatureId, FeatureRange)>,
}

/// Counterfactual generator for one additive model
pub struct GamCoach<M: AdditiveModel> {
    model: M,
    stats: ReferenceStats,
}

impl<M: AdditiveModel> GamCoach<M> {
    pub fn new(model: M, stats: ReferenceStats) -> Self {
        Self { model, stats }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn stats(&self) -> &ReferenceStats {
        &self.stats
    }

    /// Work out which way the score must move and by how much
    pub fn search_goal(&self, row: &[FeatureValue], request: &CfRequest) -> Result<SearchGoal> {
        let score = self.model.predict_score(row);

        match self.model.kind() {
            ModelKind::Classifier => {
                if request.target_range.is_some() {
                    warn!("target_range is ignored for classifiers");
                }
                // A score of exactly 0 is class 1, so leaving class 1 needs a
                // strictly negative new score.
                let (direction, needed_score_gain) = if self.model.predict(row) == 0.0 {
                    (CfDirection::Increase, -score)
                } else {
                    (CfDirection::Decrease, -score - CLASS_FLIP_MARGIN)
                };
                Ok(SearchGoal {
                    direction,
                    needed_score_gain,
                    score_gain_bound: None,
                })
            }
            ModelKind::Regressor => {
                let (lo, hi) = request.target_range.ok_or_else(|| {
                    CoachError::Configuration("target_range is required for regression models".to_string())
                })?;
                if lo > hi {
                    return Err(CoachError::Configuration(format!(
                        "target_range [{}, {}] has min greater than max",
                        lo, hi
                    )));
                }

                if score < lo {
                    Ok(SearchGoal {
                        direction: CfDirection::Increase,
                        needed_score_gain: lo - score,
                        score_gain_bound: Some(hi - score),
                    })
                } else if score > hi {
                    Ok(SearchGoal {
                        direction: CfDirection::Decrease,
                        needed_score_gain: hi - score,
                        score_gain_bound: Some(lo - score),
                    })
                } else {
                    Err(CoachError::Configuration(format!(
                        "Prediction {} is already inside target_range [{}, {}]",
                        score, lo, hi
                    )))
                }
            }
        }
    }

    /// Find up to `request.total_cfs` diverse counterfactuals for `row`
    pub fn generate_cfs(&self, row: &[FeatureValue], request: &CfRequest) -> Result<Counterfactuals> {
        let resolved = self.resolve(row, request)?;
        let goal = self.search_goal(row, request)?;

        info!(
            direction = %goal.direction,
            needed = goal.needed_score_gain,
            "Searching for counterfactuals"
        );

        let catalog = self.build_catalog(row, request, &resolved, &goal)?;

        let builder = OptimizationModelBuilder::new(
            &catalog,
            goal.direction,
            goal.needed_score_gain,
            resolved.features_to_vary.clone(),
        )
        .with_max_features_to_vary(request.max_features_to_vary);

        let model_size = builder.layout(&BTreeSet::new()).size();

        let mut controller = DiverseSolutionController::new(builder, request.total_cfs);
        if request.verbose {
            controller = controller.with_progress(create_progress_bar(
                request.total_cfs as u64,
                "Generating strategies",
            ));
        }
        let (records, success) = controller.run()?;

        let projector = ResultProjector::new(&self.model, &catalog, row);
        let solutions = records
            .iter()
            .filter_map(|r| match &r.outcome {
                RoundOutcome::Optimal(solution) => Some(projector.project(solution)),
                RoundOutcome::Infeasible => None,
            })
            .collect();

        Ok(Counterfactuals {
            solutions,
            success,
            requested: request.total_cfs,
            catalog,
            direction: goal.direction,
            needed_score_gain: goal.needed_score_gain,
            original_row: row.to_vec(),
            model_size,
        })
    }

    /// Size of the first-round model for `row`, without solving it
    pub fn model_size(&self, row: &[FeatureValue], request: &CfRequest) -> Result<ModelSize> {
        let resolved = self.resolve(row, request)?;
        let goal = self.search_goal(row, request)?;
        let catalog = self.build_catalog(row, request, &resolved, &goal)?;
        let builder = OptimizationModelBuilder::new(
            &catalog,
            goal.direction,
            goal.needed_score_gain,
            resolved.features_to_vary,
        )
        .with_max_features_to_vary(request.max_features_to_vary);
        Ok(builder.layout(&BTreeSet::new()).size())
    }

    /// Generate, filter and weight every option for `row`
    fn build_catalog(
        &self,
        row: &[FeatureValue],
        request: &CfRequest,
        resolved: &ResolvedRequest,
        goal: &SearchGoal,
    ) -> Result<OptionCatalog> {
        let explanation = self.model.explain_local(row);
        let ctx = OptionContext {
            model: &self.model,
            row,
            explanation: &explanation,
            stats: &self.stats,
            direction: goal.direction,
            score_gain_bound: goal.score_gain_bound,
            prune: request.prune_dominated,
        };

        ctx.check_all_current_bins()?;

        let epsilon = match request.similarity {
            Similarity::Threshold(e) => e,
            Similarity::Factor(f) => default_similarity_threshold(&self.model, f),
        };
        debug!(epsilon, "Similarity threshold");

        let mut catalog = OptionCatalog::new();
        for &id in &resolved.features_to_vary {
            let feature_type = self.model.feature(id).feature_type();
            let options = match feature_type {
                FeatureType::Continuous => {
                    generate_continuous_options(&ctx, id, epsilon, resolved.integer_features.contains(&id))?
                }
                _ => generate_categorical_options(&ctx, id)?,
            };
            catalog.insert_main(id, feature_type, options);
        }

        for (id, range) in &resolved.feature_ranges {
            catalog.retain_main(*id, |o| range.contains(&o.target));
        }

        for (i, feature) in self.model.features().iter().enumerate() {
            let Some(term) = feature.interaction_term() else {
                continue;
            };
            if !(resolved.features_to_vary.contains(&term.first)
                && resolved.features_to_vary.contains(&term.second))
            {
                continue;
            }
            let id = FeatureId(i);
            let options = expand_interaction(
                id,
                term,
                explanation.contributions.get(i).copied().unwrap_or(0.0),
                catalog.main_options(term.first),
                catalog.main_options(term.second),
            );
            catalog.insert_interaction(id, (term.first, term.second), options);
        }

        let weight = match request.categorical_weight {
            CategoricalWeight::Auto => catalog.auto_categorical_weight(),
            CategoricalWeight::Fixed(w) => w,
        };
        catalog.scale_categorical_distances(weight);

        debug!(
            main_options = catalog.main_option_count(),
            interaction_options = catalog.interaction_option_count(),
            categorical_weight = weight,
            "Built option catalog"
        );

        Ok(catalog)
    }

    /// Check the row and resolve feature names to ids
    fn resolve(&self, row: &[FeatureValue], request: &CfRequest) -> Result<ResolvedRequest> {
        if request.total_cfs == 0 {
            return Err(CoachError::Configuration("total_cfs must be at least 1".to_string()));
        }

        if let CategoricalWeight::Fixed(w) = request.categorical_weight {
            if !(w.is_finite() && w > 0.0) {
                return Err(CoachError::Configuration(format!(
                    "categorical_weight must be a positive number, got {}",
                    w
                )));
            }
        }

        let (similarity_name, similarity_value) = match request.similarity {
            Similarity::Factor(f) => ("similarity_factor", f),
            Similarity::Threshold(t) => ("similarity_threshold", t),
        };
        if !(similarity_value.is_finite() && similarity_value >= 0.0) {
            return Err(CoachError::Configuration(format!(
                "{} must be a non-negative number, got {}",
                similarity_name, similarity_value
            )));
        }

        let main_count = self.model.main_feature_count();
        if row.len() != main_count {
            return Err(CoachError::Configuration(format!(
                "Input row has {} values, expected {}",
                row.len(),
                main_count
            )));
        }

        for (feature, value) in self.model.features()[..main_count].iter().zip(row) {
            let ok = match feature.feature_type() {
                FeatureType::Continuous => value.as_number().is_some_and(|x| x.is_finite()),
                _ => value.as_level().is_some(),
            };
            if !ok {
                return Err(CoachError::Configuration(format!(
                    "Value {} does not fit {} feature '{}'",
                    value,
                    feature.feature_type(),
                    feature.name
                )));
            }
        }

        let lookup = |name: &str, field: &str| -> Result<FeatureId> {
            self.model.feature_id(name).ok_or_else(|| {
                CoachError::Configuration(format!("Unknown feature '{}' in {}", name, field))
            })
        };

        let features_to_vary = match &request.features_to_vary {
            None => (0..main_count).map(FeatureId).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    let id = lookup(name, "features_to_vary")?;
                    if self.model.feature(id).is_interaction() {
                        return Err(CoachError::Configuration(format!(
                            "Interaction '{}' cannot be varied directly",
                            name
                        )));
                    }
                    Ok(id)
                })
                .collect::<Result<BTreeSet<_>>>()?,
        };

        let integer_features = request
            .continuous_integer_features
            .iter()
            .map(|name| {
                let id = lookup(name, "continuous_integer_features")?;
                if self.model.feature(id).feature_type() != FeatureType::Continuous {
                    return Err(CoachError::Configuration(format!(
                        "Integer feature '{}' is not continuous",
                        name
                    )));
                }
                Ok(id)
            })
            .collect::<Result<BTreeSet<_>>>()?;

        let mut feature_ranges = Vec::with_capacity(request.feature_ranges.len());
        for (name, range) in &request.feature_ranges {
            let id = lookup(name, "feature_ranges")?;
            let kind_ok = matches!(
                (self.model.feature(id).feature_type(), range),
                (FeatureType::Continuous, FeatureRange::Continuous { .. })
                    | (FeatureType::Categorical, FeatureRange::Categorical(_))
            );
            if !kind_ok {
                return Err(CoachError::Configuration(format!(
                    "Range for '{}' does not match its feature type",
                    name
                )));
            }
            if let FeatureRange::Continuous { min, max } = range {
                if min > max {
                    return Err(CoachError::Configuration(format!(
                        "Range for '{}' has min greater than max",
                        name
                    )));
                }
            }
            feature_ranges.push((id, range.clone()));
        }

        Ok(ResolvedRequest {
            features_to_vary,
            integer_features,
            feature_ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feature, Gam};

    fn regressor() -> Gam {
        Gam::new(
            vec![
                Feature::continuous("x", vec![0.0, 10.0, 20.0], vec![0.0, 2.0, 3.0]),
                Feature::categorical("c", vec!["a".into(), "b".into()], vec![0.0, 2.5]),
            ],
            5.0,
            ModelKind::Regressor,
        )
        .unwrap()
    }

    fn row() -> Vec<FeatureValue> {
        vec![FeatureValue::Number(5.0), FeatureValue::Level("a".into())]
    }

    #[test]
    fn test_categorical_weight_from_str() {
        assert_eq!("auto".parse::<CategoricalWeight>().unwrap(), CategoricalWeight::Auto);
        assert_eq!("AUTO".parse::<CategoricalWeight>().unwrap(), CategoricalWeight::Auto);
        assert_eq!(
            "2.5".parse::<CategoricalWeight>().unwrap(),
            CategoricalWeight::Fixed(2.5)
        );
        assert!("-1".parse::<CategoricalWeight>().is_err());
        assert!("heavy".parse::<CategoricalWeight>().is_err());
    }

    #[test]
    fn test_regression_goal() {
        let coach = GamCoach::new(regressor(), ReferenceStats::default());
        let goal = coach
            .search_goal(&row(), &CfRequest::new(1).with_target_range(7.0, 9.0))
            .unwrap();
        assert_eq!(goal.direction, CfDirection::Increase);
        assert_eq!(goal.needed_score_gain, 2.0);
        assert_eq!(goal.score_gain_bound, Some(4.0));

        let goal = coach
            .search_goal(&row(), &CfRequest::new(1).with_target_range(1.0, 3.0))
            .unwrap();
        assert_eq!(goal.direction, CfDirection::Decrease);
        assert_eq!(goal.needed_score_gain, -2.0);
        assert_eq!(goal.score_gain_bound, Some(-4.0));
    }

    #[test]
    fn test_class_one_goal_requires_negative_score() {
        let gam = Gam::new(
            vec![Feature::continuous("x", vec![0.0, 10.0, 20.0], vec![-1.0, 0.0, 1.0])],
            0.0,
            ModelKind::Classifier,
        )
        .unwrap();
        let coach = GamCoach::new(gam, ReferenceStats::default());
        let goal = coach
            .search_goal(&[FeatureValue::Number(15.0)], &CfRequest::new(1))
            .unwrap();

        assert_eq!(goal.direction, CfDirection::Decrease);
        assert!(goal.needed_score_gain < 0.0);
        assert!(!goal.direction.is_satisfied(0.0, goal.needed_score_gain));
    }

    #[test]
    fn test_regression_requires_range_outside_prediction() {
        let coach = GamCoach::new(regressor(), ReferenceStats::default());
        let err = coach.generate_cfs(&row(), &CfRequest::new(1)).unwrap_err();
        assert!(matches!(err, CoachError::Configuration(_)));

        let err = coach
            .generate_cfs(&row(), &CfRequest::new(1).with_target_range(4.0, 6.0))
            .unwrap_err();
        assert!(err.to_string().contains("already inside"));
    }

    #[test]
    fn test_resolve_rejects_bad_requests() {
        let coach = GamCoach::new(regressor(), ReferenceStats::default());
        let base = CfRequest::new(1).with_target_range(7.0, 9.0);

        let cases = vec![
            CfRequest { total_cfs: 0, ..base.clone() },
            base.clone().with_features_to_vary(["zip"]),
            base.clone().with_integer_features(["c"]),
            base.clone()
                .with_feature_range("x", FeatureRange::Categorical(vec!["a".into()])),
            base.clone().with_feature_range(
                "x",
                FeatureRange::Continuous {
                    min: 9.0,
                    max: 1.0,
                },
            ),
            base.clone().with_categorical_weight(CategoricalWeight::Fixed(-1.0)),
            base.clone().with_categorical_weight(CategoricalWeight::Fixed(f64::NAN)),
            base.clone().with_similarity(Similarity::Threshold(-0.1)),
            base.clone().with_similarity(Similarity::Factor(f64::INFINITY)),
        ];
        for request in cases {
            let err = coach.generate_cfs(&row(), &request).unwrap_err();
            assert!(matches!(err, CoachError::Configuration(_)), "{:?}", request);
        }

        let short_row = vec![FeatureValue::Number(5.0)];
        assert!(coach.generate_cfs(&short_row, &base).is_err());

        let wrong_kind = vec![FeatureValue::Level("5".into()), FeatureValue::Level("a".into())];
        assert!(coach.generate_cfs(&wrong_kind, &base).is_err());
    }

    #[test]
    fn test_generate_regression_cfs() {
        let coach = GamCoach::new(regressor(), ReferenceStats::default());
        let request = CfRequest::new(2)
            .with_target_range(7.0, 9.0)
            .with_categorical_weight(CategoricalWeight::Fixed(1.0));
        let cfs = coach.generate_cfs(&row(), &request).unwrap();

        assert_eq!(cfs.direction, CfDirection::Increase);
        assert_eq!(cfs.needed_score_gain, 2.0);
        assert!(!cfs.is_empty());
        for prediction in cfs.new_predictions(coach.model()) {
            assert!((7.0 - 1e-9..=9.0 + 1e-9).contains(&prediction));
        }
    }
}
