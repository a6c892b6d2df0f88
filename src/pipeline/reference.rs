//! Reference statistics and movement cost
//!
//! Continuous moves are scaled by the median absolute deviation (MAD) of the
//! feature in the reference data. Categorical moves cost `1 - frequency` of
//! the target level, so common levels are cheaper to move to.

use std::collections::HashMap;

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{CoachError, Result};
use crate::model::{AdditiveModel, FeatureType, FeatureValue};

/// How to price a move to a different categorical level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CategoricalCost {
    /// `1 - frequency(level)` in the reference data
    #[default]
    Frequency,
    /// Every differing level costs 1
    Flat,
}

impl std::fmt::Display for CategoricalCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoricalCost::Frequency => write!(f, "frequency"),
            CategoricalCost::Flat => write!(f, "flat"),
        }
    }
}

/// Per-feature statistics used to price option distances
#[derive(Debug, Clone, Default)]
pub struct ReferenceStats {
    mads: HashMap<String, f64>,
    level_distances: HashMap<String, HashMap<String, f64>>,
    categorical_cost: CategoricalCost,
}

enum ColumnStats {
    Mad(f64),
    Levels(HashMap<String, f64>),
}

impl ReferenceStats {
    /// Compute statistics from in-memory reference rows (one value per main
    /// feature, in model order).
    pub fn from_rows<M: AdditiveModel + ?Sized>(model: &M, rows: &[Vec<FeatureValue>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(CoachError::Data("Reference data has no rows".to_string()));
        }

        let main_count = model.main_feature_count();
        if let Some(bad) = rows.iter().position(|r| r.len() != main_count) {
            return Err(CoachError::Data(format!(
                "Reference row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                main_count
            )));
        }

        let stats: Vec<(String, ColumnStats)> = model.features()[..main_count]
            .par_iter()
            .enumerate()
            .map(|(col, feature)| {
                let stats = match feature.feature_type() {
                    FeatureType::Continuous => {
                        let xs: Vec<f64> = rows.iter().filter_map(|r| r[col].as_number()).collect();
                        ColumnStats::Mad(compute_mad(&xs))
                    }
                    _ => {
                        let levels: Vec<String> = rows.iter().map(|r| level_key(&r[col])).collect();
                        ColumnStats::Levels(compute_frequency_distance(&levels))
                    }
                };
                (feature.name.clone(), stats)
            })
            .collect();

        Ok(Self::from_column_stats(stats))
    }

    /// Compute statistics from a reference DataFrame with one column per main
    /// feature (matched by name). Nulls are ignored.
    pub fn from_dataframe<M: AdditiveModel + ?Sized>(model: &M, df: &DataFrame) -> Result<Self> {
        if df.height() == 0 {
            return Err(CoachError::Data("Reference data has no rows".to_string()));
        }

        let main_features: Vec<_> = model.features().iter().filter(|f| !f.is_interaction()).collect();

        let stats: Vec<(String, ColumnStats)> = main_features
            .par_iter()
            .map(|feature| -> Result<(String, ColumnStats)> {
                let column = df.column(&feature.name).map_err(|_| {
                    CoachError::Data(format!(
                        "Reference data has no column for feature '{}'",
                        feature.name
                    ))
                })?;

                let stats = match feature.feature_type() {
                    FeatureType::Continuous => {
                        let float_col = column.cast(&DataType::Float64)?;
                        let xs: Vec<f64> = float_col.f64()?.into_iter().flatten().collect();
                        ColumnStats::Mad(compute_mad(&xs))
                    }
                    _ => {
                        let str_col = column.cast(&DataType::String)?;
                        let levels: Vec<String> = str_col
                            .str()?
                            .into_iter()
                            .flatten()
                            .map(|s| s.to_string())
                            .collect();
                        ColumnStats::Levels(compute_frequency_distance(&levels))
                    }
                };
                Ok((feature.name.clone(), stats))
            })
            .collect::<Result<_>>()?;

        Ok(Self::from_column_stats(stats))
    }

    fn from_column_stats(stats: Vec<(String, ColumnStats)>) -> Self {
        let mut mads = HashMap::new();
        let mut level_distances = HashMap::new();
        for (name, stat) in stats {
            match stat {
                ColumnStats::Mad(mad) => {
                    mads.insert(name, mad);
                }
                ColumnStats::Levels(levels) => {
                    level_distances.insert(name, levels);
                }
            }
        }
        Self {
            mads,
            level_distances,
            categorical_cost: CategoricalCost::default(),
        }
    }

    /// Override computed MADs for the given features
    pub fn with_mads(mut self, mads: HashMap<String, f64>) -> Self {
        self.mads.extend(mads);
        self
    }

    /// Override computed level distances for the given features
    pub fn with_level_distances(mut self, distances: HashMap<String, HashMap<String, f64>>) -> Self {
        self.level_distances.extend(distances);
        self
    }

    pub fn with_categorical_cost(mut self, cost: CategoricalCost) -> Self {
        self.categorical_cost = cost;
        self
    }

    pub fn categorical_cost(&self) -> CategoricalCost {
        self.categorical_cost
    }

    /// MAD of a continuous feature; zero when unknown
    pub fn mad(&self, feature: &str) -> f64 {
        self.mads.get(feature).copied().unwrap_or(0.0)
    }

    /// `|target - current| / MAD`, or the raw difference when MAD is zero
    pub fn continuous_distance(&self, feature: &str, current: f64, target: f64) -> f64 {
        let raw = (target - current).abs();
        let mad = self.mad(feature);
        if mad > 0.0 {
            raw / mad
        } else {
            raw
        }
    }

    /// Cost of moving to `level`. Levels absent from the reference data cost 1.
    pub fn categorical_distance(&self, feature: &str, level: &str) -> f64 {
        match self.categorical_cost {
            CategoricalCost::Flat => 1.0,
            CategoricalCost::Frequency => self
                .level_distances
                .get(feature)
                .and_then(|levels| levels.get(level))
                .copied()
                .unwrap_or(1.0),
        }
    }
}

fn level_key(value: &FeatureValue) -> String {
    match value {
        FeatureValue::Level(level) => level.clone(),
        FeatureValue::Number(x) => x.to_string(),
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median absolute deviation. NaNs are ignored; an empty column has MAD 0.
pub fn compute_mad(xs: &[f64]) -> f64 {
    let mut values: Vec<f64> = xs.iter().copied().filter(|x| !x.is_nan()).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let center = median(&values);

    let mut deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    deviations.sort_by(|a, b| a.total_cmp(b));
    median(&deviations)
}

/// `level -> 1 - frequency(level)` for a categorical column
pub fn compute_frequency_distance<S: AsRef<str>>(xs: &[S]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for x in xs {
        *counts.entry(x.as_ref().to_string()).or_insert(0) += 1;
    }

    let total = xs.len() as f64;
    counts
        .into_iter()
        .map(|(level, count)| (level, 1.0 - count as f64 / total))
        .collect()
}
