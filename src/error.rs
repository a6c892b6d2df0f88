//! Error types for counterfactual generation.
//!
//! `CoachError` covers everything the library can reject. Infeasible
//! optimization rounds are not errors; they are reported through
//! the success flag of [`crate::report::Counterfactuals`].

use thiserror::Error;

/// Errors that can occur while generating counterfactuals.
#[derive(Debug, Error)]
pub enum CoachError {
    /// The request is contradictory or incomplete (e.g. regression without
    /// a target range, or a target range that already covers the prediction).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The bin located for the current value disagrees with the model's own
    /// local explanation. This is a data or programming error.
    #[error(
        "Data inconsistency for feature '{feature}': located bin {located_bin} has score {expected_score}, \
         but the local explanation reports {explained_score}"
    )]
    DataInconsistency {
        feature: String,
        located_bin: usize,
        expected_score: f64,
        explained_score: f64,
    },

    /// The model description is malformed.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The reference dataset cannot be used to compute distances.
    #[error("Invalid reference data: {0}")]
    Data(String),

    /// The solver failed for a reason other than infeasibility.
    #[error("Solver failure: {0}")]
    Solver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = CoachError::Configuration("target_range is required".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: target_range is required"
        );
    }

    #[test]
    fn test_data_inconsistency_display() {
        let err = CoachError::DataInconsistency {
            feature: "loan_amnt".to_string(),
            located_bin: 3,
            expected_score: 0.25,
            explained_score: 0.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("loan_amnt"));
        assert!(msg.contains("located bin 3"));
        assert!(msg.contains("0.5"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoachError = json_err.into();
        assert!(matches!(err, CoachError::Json(_)));
    }
}
