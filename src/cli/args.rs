//! Command-line argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{CategoricalWeight, Similarity};

/// GAM Coach - Generate actionable counterfactual strategies for additive models
#[derive(Parser, Debug)]
#[command(name = "gamcoach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model description (JSON)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Reference dataset used to compute distances (CSV or Parquet)
    #[arg(short = 'd', long = "data")]
    pub reference: PathBuf,

    /// Request file with the input row and constraints (JSON)
    #[arg(short, long)]
    pub request: PathBuf,

    /// Write strategies to this JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of diverse strategies to generate (overrides the request file)
    #[arg(long, value_parser = validate_total_cfs)]
    pub total_cfs: Option<usize>,

    /// Maximum number of features changed by one strategy
    #[arg(long)]
    pub max_features_to_vary: Option<usize>,

    /// Absolute score-gain threshold below which two options are considered similar.
    /// Takes precedence over --similarity-factor.
    #[arg(long, value_parser = validate_non_negative)]
    pub similarity_threshold: Option<f64>,

    /// Similarity threshold as a fraction of the mean continuous score range
    #[arg(long, value_parser = validate_non_negative)]
    pub similarity_factor: Option<f64>,

    /// Categorical distance weight: "auto" or a positive number
    #[arg(long)]
    pub categorical_weight: Option<CategoricalWeight>,

    /// Every categorical change costs 1 instead of 1 - frequency
    #[arg(long, default_value = "false")]
    pub flat_categorical_cost: bool,

    /// Hide the banner and progress output
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Similarity setting from the command line, if any
    pub fn similarity(&self) -> Option<Similarity> {
        match (self.similarity_threshold, self.similarity_factor) {
            (Some(threshold), _) => Some(Similarity::Threshold(threshold)),
            (None, Some(factor)) => Some(Similarity::Factor(factor)),
            (None, None) => None,
        }
    }
}

/// Validator for total_cfs parameter
fn validate_total_cfs(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid count", s))?;

    if value == 0 {
        Err("total_cfs must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

/// Validator for similarity parameters
fn validate_non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !value.is_finite() || value < 0.0 {
        Err(format!("value must be a non-negative number, got {}", value))
    } else {
        Ok(value)
    }
}
