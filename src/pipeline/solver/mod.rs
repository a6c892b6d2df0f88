//! Counterfactual search as a Mixed Integer Program
//!
//! Each round minimises the total distance of the selected options subject
//! to a score-gain threshold, solved with HiGHS via good_lp. Diverse
//! solutions come from re-solving with previously chosen options muted.

mod diverse;
mod model;

use serde::Serialize;

use crate::model::FeatureId;

pub use diverse::{ControllerState, DiverseSolutionController, RoundRecord};
pub use model::{solve_layout, ModelLayout, OptimizationModelBuilder, VariableKind, VariableSpec};

/// Structured identifier of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableKey {
    /// Binary choice of main option `bin` for `feature`
    Main { feature: FeatureId, bin: usize },
    /// AND of the two constituent main options of an interaction
    Interaction {
        feature: FeatureId,
        bins: (usize, usize),
    },
}

impl VariableKey {
    pub fn feature(&self) -> FeatureId {
        match self {
            VariableKey::Main { feature, .. } | VariableKey::Interaction { feature, .. } => *feature,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, VariableKey::Main { .. })
    }
}

impl std::fmt::Display for VariableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKey::Main { feature, bin } => write!(f, "{}:{}", feature, bin),
            VariableKey::Interaction { feature, bins } => {
                write!(f, "{}:{},{}", feature, bins.0, bins.1)
            }
        }
    }
}

/// A variable set to 1 in a round's optimum
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveVariable {
    pub key: VariableKey,
    pub score_gain: f64,
    pub distance: f64,
}

/// Optimum of one round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSolution {
    pub active: Vec<ActiveVariable>,
    /// Total distance of the active variables
    pub objective: f64,
    /// Total score gain of the active variables
    pub score_gain: f64,
}

impl RoundSolution {
    fn from_active(active: Vec<ActiveVariable>) -> Self {
        let objective = active.iter().map(|v| v.distance).sum();
        let score_gain = active.iter().map(|v| v.score_gain).sum();
        Self {
            active,
            objective,
            score_gain,
        }
    }
}

/// Result of one solve
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Optimal(RoundSolution),
    Infeasible,
}

/// Size of an assembled model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelSize {
    pub variables: usize,
    pub constraints: usize,
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} variables, {} constraints", self.variables, self.constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_key_order_and_display() {
        let a = VariableKey::Main {
            feature: FeatureId(0),
            bin: 3,
        };
        let b = VariableKey::Interaction {
            feature: FeatureId(2),
            bins: (1, 0),
        };
        assert!(a < b);
        assert_eq!(a.to_string(), "#0:3");
        assert_eq!(b.to_string(), "#2:1,0");
        assert!(a.is_main());
        assert_eq!(b.feature(), FeatureId(2));
    }

    #[test]
    fn test_round_solution_totals() {
        let solution = RoundSolution::from_active(vec![
            ActiveVariable {
                key: VariableKey::Main {
                    feature: FeatureId(0),
                    bin: 1,
                },
                score_gain: 1.5,
                distance: 2.0,
            },
            ActiveVariable {
                key: VariableKey::Main {
                    feature: FeatureId(1),
                    bin: 0,
                },
                score_gain: 0.5,
                distance: 0.25,
            },
        ]);
        assert_eq!(solution.objective, 2.25);
        assert_eq!(solution.score_gain, 2.0);
    }
}
