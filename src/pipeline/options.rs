//! Per-feature option generation
//!
//! For every main-effect feature we enumerate the bins (or levels) it could
//! move to, price each move, and drop options that cannot help:
//!
//! 1. Unhelpful options move the score the wrong way.
//! 2. Out-of-bound options overshoot the regression target range.
//! 3. Redundant options (continuous only) give nearly the same score gain as
//!    a cheaper option.

use serde::Serialize;

use super::catalog::{CfDirection, InteractionOffset, MainOption};
use super::reference::ReferenceStats;
use crate::error::{CoachError, Result};
use crate::model::{AdditiveModel, BinAxis, FeatureId, FeatureValue, LocalExplanation};

/// Offset used to place a target just below the right edge of a bin
const LEFT_EDGE_EPSILON: f64 = 1e-4;

/// Relative tolerance for the current-bin consistency check
const SCORE_TOLERANCE: f64 = 1e-9;

/// Permitted values for one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FeatureRange {
    /// Inclusive `[min, max]` window for a continuous feature
    Continuous { min: f64, max: f64 },
    /// Allowed levels for a categorical feature
    Categorical(Vec<String>),
}

impl FeatureRange {
    pub fn contains(&self, value: &FeatureValue) -> bool {
        match (self, value) {
            (FeatureRange::Continuous { min, max }, FeatureValue::Number(x)) => *x >= *min && *x <= *max,
            (FeatureRange::Categorical(levels), FeatureValue::Level(level)) => levels.contains(level),
            _ => false,
        }
    }
}

/// Everything option generation needs to know about the current input
pub struct OptionContext<'a, M: AdditiveModel + ?Sized> {
    pub model: &'a M,
    pub row: &'a [FeatureValue],
    pub explanation: &'a LocalExplanation,
    pub stats: &'a ReferenceStats,
    pub direction: CfDirection,
    /// Signed cap on a single option's gain (regression only)
    pub score_gain_bound: Option<f64>,
    /// Disables sign filtering and similarity pruning when false
    pub prune: bool,
}

impl<'a, M: AdditiveModel + ?Sized> OptionContext<'a, M> {
    fn current_score(&self, feature: FeatureId) -> f64 {
        self.explanation
            .contributions
            .get(feature.0)
            .copied()
            .unwrap_or(0.0)
    }

    /// Score change of every interaction involving `feature` if it alone moved
    /// to `candidate`.
    pub fn interaction_offsets(&self, feature: FeatureId, candidate: &FeatureValue) -> Vec<InteractionOffset> {
        self.model
            .features()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let term = f.interaction_term()?;
                let partner = term.partner_of(feature)?;
                let partner_value = self.row.get(partner.0)?;

                let new_score = if term.first == feature {
                    term.score_for(candidate, partner_value)
                } else {
                    term.score_for(partner_value, candidate)
                };

                Some(InteractionOffset {
                    interaction: FeatureId(i),
                    score_gain: new_score - self.current_score(FeatureId(i)),
                })
            })
            .collect()
    }

    /// Whether a gain survives the direction and bound filters
    fn is_helpful(&self, score_gain: f64) -> bool {
        if self.prune && self.direction.sign() * score_gain <= 0.0 {
            return false;
        }
        match (self.score_gain_bound, self.direction) {
            (Some(bound), CfDirection::Increase) => score_gain <= bound,
            (Some(bound), CfDirection::Decrease) => score_gain >= bound,
            (None, _) => true,
        }
    }

    /// Check every main feature, varied or fixed, against the explanation
    pub fn check_all_current_bins(&self) -> Result<()> {
        let main_count = self.model.main_feature_count();
        for (i, feature) in self.model.features()[..main_count].iter().enumerate() {
            let Some((axis, scores)) = feature.main_effect() else {
                continue;
            };
            self.check_current_bin(FeatureId(i), axis.locate(&self.row[i]), scores)?;
        }
        Ok(())
    }

    fn check_current_bin(&self, feature: FeatureId, bin: Option<usize>, scores: &[f64]) -> Result<f64> {
        let explained = self.current_score(feature);
        let expected = bin.and_then(|b| scores.get(b).copied()).unwrap_or(0.0);

        if (expected - explained).abs() > SCORE_TOLERANCE * expected.abs().max(1.0) {
            return Err(CoachError::DataInconsistency {
                feature: self.model.feature(feature).name.clone(),
                located_bin: bin.unwrap_or(usize::MAX),
                expected_score: expected,
                explained_score: explained,
            });
        }
        Ok(explained)
    }
}

/// Target value inside bin `bin`, moving from the current bin `current`.
///
/// Bins to the right use their left edge; bins to the left use their right
/// edge nudged down into the bin. Integer features use the closest integer
/// inside the bin, and `None` means the bin holds no integer.
fn continuous_target(bin_starts: &[f64], bin: usize, current: usize, need_int: bool) -> Option<(f64, f64)> {
    let lo = bin_starts[bin];
    let hi = bin_starts.get(bin + 1).copied();

    if bin < current {
        // Left bins always have a right edge
        let hi = hi?;
        if need_int {
            let target = hi.ceil() - 1.0;
            if target < lo {
                return None;
            }
            Some((target, target))
        } else {
            let mut target = hi - LEFT_EDGE_EPSILON;
            if target < lo {
                target = (lo + hi) / 2.0;
            }
            Some((target, hi))
        }
    } else if need_int {
        let target = lo.ceil();
        if matches!(hi, Some(hi) if target >= hi) {
            return None;
        }
        Some((target, target))
    } else {
        Some((lo, lo))
    }
}

/// Generate options for a continuous feature.
///
/// `epsilon` is the similarity threshold: after sorting by distance, an option
/// whose gain is within `epsilon` of a cheaper kept option is dropped.
pub fn generate_continuous_options<M: AdditiveModel + ?Sized>(
    ctx: &OptionContext<'_, M>,
    feature: FeatureId,
    epsilon: f64,
    need_int: bool,
) -> Result<Vec<MainOption>> {
    let spec = ctx.model.feature(feature);
    let (bin_starts, scores) = match spec.main_effect() {
        Some((BinAxis::Continuous(starts), scores)) => (starts, scores),
        _ => {
            return Err(CoachError::Configuration(format!(
                "Feature '{}' is not continuous",
                spec.name
            )))
        }
    };

    let current_value = ctx.row[feature.0].as_number().ok_or_else(|| {
        CoachError::Configuration(format!("Feature '{}' expects a numeric value", spec.name))
    })?;

    let current_bin = crate::model::locate(bin_starts, current_value);
    let current_score = ctx.check_current_bin(feature, Some(current_bin), scores)?;

    let mut options = Vec::new();

    for (bin, score) in scores.iter().enumerate() {
        if bin == current_bin {
            continue;
        }

        let Some((target, distance_anchor)) = continuous_target(bin_starts, bin, current_bin, need_int) else {
            continue;
        };

        let target_value = FeatureValue::Number(target);
        let offsets = ctx.interaction_offsets(feature, &target_value);
        let score_gain = score - current_score + offsets.iter().map(|o| o.score_gain).sum::<f64>();

        if !ctx.is_helpful(score_gain) {
            continue;
        }

        options.push(MainOption {
            target: target_value,
            score_gain,
            distance: ctx.stats.continuous_distance(&spec.name, current_value, distance_anchor),
            bin,
            interaction_offsets: offsets,
        });
    }

    options.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    if ctx.prune {
        options = prune_similar_options(options, epsilon);
    }

    Ok(options)
}

/// Generate options for a categorical feature: every other helpful level.
pub fn generate_categorical_options<M: AdditiveModel + ?Sized>(
    ctx: &OptionContext<'_, M>,
    feature: FeatureId,
) -> Result<Vec<MainOption>> {
    let spec = ctx.model.feature(feature);
    let (levels, scores) = match spec.main_effect() {
        Some((BinAxis::Categorical(levels), scores)) => (levels, scores),
        _ => {
            return Err(CoachError::Configuration(format!(
                "Feature '{}' is not categorical",
                spec.name
            )))
        }
    };

    let current_level = ctx.row[feature.0].as_level().ok_or_else(|| {
        CoachError::Configuration(format!("Feature '{}' expects a level", spec.name))
    })?;

    let current_bin = levels.iter().position(|l| l == current_level);
    let current_score = ctx.check_current_bin(feature, current_bin, scores)?;

    let mut options = Vec::new();

    for (bin, (level, score)) in levels.iter().zip(scores).enumerate() {
        if level == current_level {
            continue;
        }

        let target_value = FeatureValue::Level(level.clone());
        let offsets = ctx.interaction_offsets(feature, &target_value);
        let score_gain = score - current_score + offsets.iter().map(|o| o.score_gain).sum::<f64>();

        if !ctx.is_helpful(score_gain) {
            continue;
        }

        options.push(MainOption {
            target: target_value,
            score_gain,
            distance: ctx.stats.categorical_distance(&spec.name, level),
            bin,
            interaction_offsets: offsets,
        });
    }

    Ok(options)
}

/// Drop near-duplicate options, keeping the cheapest representative.
///
/// `options` must be sorted by ascending distance. An option is kept only if
/// its gain differs by at least `epsilon` from every option kept before it.
pub fn prune_similar_options(options: Vec<MainOption>, epsilon: f64) -> Vec<MainOption> {
    let mut kept: Vec<MainOption> = Vec::with_capacity(options.len());
    for option in options {
        if kept
            .iter()
            .all(|k| (k.score_gain - option.score_gain).abs() >= epsilon)
        {
            kept.push(option);
        }
    }
    kept
}

/// Default similarity threshold: `factor` times the mean additive-score range
/// of all continuous features.
pub fn default_similarity_threshold<M: AdditiveModel + ?Sized>(model: &M, factor: f64) -> f64 {
    let ranges: Vec<f64> = model
        .features()
        .iter()
        .filter(|f| f.feature_type() == crate::model::FeatureType::Continuous)
        .filter_map(|f| f.score_range())
        .collect();

    if ranges.is_empty() {
        return 0.0;
    }
    factor * ranges.iter().sum::<f64>() / ranges.len() as f64
}
