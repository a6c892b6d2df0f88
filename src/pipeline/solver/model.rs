//! MIP model construction and solving for counterfactual search
//!
//! The builder first lays the model out as plain data (`ModelLayout`), so
//! that its structure can be inspected and counted without a solver, then
//! `solve_layout` turns the layout into a good_lp problem.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};

use super::{ActiveVariable, ModelSize, RoundOutcome, RoundSolution, VariableKey};
use crate::error::{CoachError, Result};
use crate::model::FeatureId;
use crate::pipeline::catalog::{CfDirection, OptionCatalog};

/// Domain of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// 0/1 choice of one main option
    Binary,
    /// Continuous [0, 1] variable tied to the AND of two binaries, given by
    /// their indices in `ModelLayout::variables`
    And { first: usize, second: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub key: VariableKey,
    pub kind: VariableKind,
    pub score_gain: f64,
    pub distance: f64,
}

/// Solver-independent description of one round's model
#[derive(Debug, Clone)]
pub struct ModelLayout {
    pub variables: Vec<VariableSpec>,
    /// Main variables of each feature; at most one may be selected
    pub feature_groups: BTreeMap<FeatureId, Vec<usize>>,
    pub max_features_to_vary: Option<usize>,
    pub direction: CfDirection,
    pub needed_score_gain: f64,
}

impl ModelLayout {
    pub fn size(&self) -> ModelSize {
        let and_count = self
            .variables
            .iter()
            .filter(|v| matches!(v.kind, VariableKind::And { .. }))
            .count();
        let group_count = self.feature_groups.values().filter(|g| !g.is_empty()).count();
        let cap = usize::from(self.max_features_to_vary.is_some() && group_count > 0);

        ModelSize {
            variables: self.variables.len(),
            constraints: group_count + cap + 3 * and_count + usize::from(!self.variables.is_empty()),
        }
    }
}

/// Turns the option catalog into a MIP, one round at a time
pub struct OptimizationModelBuilder<'a> {
    catalog: &'a OptionCatalog,
    direction: CfDirection,
    needed_score_gain: f64,
    features_to_vary: BTreeSet<FeatureId>,
    max_features_to_vary: Option<usize>,
}

impl<'a> OptimizationModelBuilder<'a> {
    pub fn new(
        catalog: &'a OptionCatalog,
        direction: CfDirection,
        needed_score_gain: f64,
        features_to_vary: BTreeSet<FeatureId>,
    ) -> Self {
        Self {
            catalog,
            direction,
            needed_score_gain,
            features_to_vary,
            max_features_to_vary: None,
        }
    }

    pub fn with_max_features_to_vary(mut self, max: Option<usize>) -> Self {
        self.max_features_to_vary = max;
        self
    }

    /// Lay out the model with every key in `muted` excluded
    pub fn layout(&self, muted: &BTreeSet<VariableKey>) -> ModelLayout {
        let mut variables = Vec::new();
        let mut feature_groups: BTreeMap<FeatureId, Vec<usize>> = BTreeMap::new();
        let mut main_index: HashMap<VariableKey, usize> = HashMap::new();

        for (feature, options) in self.catalog.main_features() {
            if !self.features_to_vary.contains(&feature) {
                continue;
            }
            for option in options {
                let key = VariableKey::Main {
                    feature,
                    bin: option.bin,
                };
                if muted.contains(&key) {
                    continue;
                }
                main_index.insert(key, variables.len());
                feature_groups.entry(feature).or_default().push(variables.len());
                variables.push(VariableSpec {
                    key,
                    kind: VariableKind::Binary,
                    score_gain: option.score_gain,
                    distance: option.distance,
                });
            }
        }

        for (feature, (first_id, second_id), options) in self.catalog.interaction_features() {
            for option in options {
                let first_key = VariableKey::Main {
                    feature: first_id,
                    bin: option.bins.0,
                };
                let second_key = VariableKey::Main {
                    feature: second_id,
                    bin: option.bins.1,
                };
                // Both constituents must be selectable in this round
                let (Some(&first), Some(&second)) = (main_index.get(&first_key), main_index.get(&second_key)) else {
                    continue;
                };
                variables.push(VariableSpec {
                    key: VariableKey::Interaction {
                        feature,
                        bins: option.bins,
                    },
                    kind: VariableKind::And { first, second },
                    score_gain: option.score_gain,
                    distance: option.distance(),
                });
            }
        }

        ModelLayout {
            variables,
            feature_groups,
            max_features_to_vary: self.max_features_to_vary,
            direction: self.direction,
            needed_score_gain: self.needed_score_gain,
        }
    }
}

/// Solve a laid-out model with the default good_lp solver.
///
/// Infeasible and unbounded problems yield `RoundOutcome::Infeasible`; any
/// other solver failure is an error. A model without variables is decided
/// directly: it is feasible only if a zero score gain already suffices.
pub fn solve_layout(layout: &ModelLayout) -> Result<RoundOutcome> {
    if layout.variables.is_empty() {
        return Ok(if layout.direction.is_satisfied(0.0, layout.needed_score_gain) {
            RoundOutcome::Optimal(RoundSolution::from_active(Vec::new()))
        } else {
            RoundOutcome::Infeasible
        });
    }

    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = layout
        .variables
        .iter()
        .map(|spec| match spec.kind {
            VariableKind::Binary => vars.add(variable().binary()),
            VariableKind::And { .. } => vars.add(variable().min(0.0).max(1.0)),
        })
        .collect();

    // Objective: minimise total distance
    let objective: Expression = layout
        .variables
        .iter()
        .zip(&handles)
        .map(|(spec, var)| spec.distance * *var)
        .sum();

    let mut problem = vars.minimise(objective).using(default_solver);

    // At most one option per feature
    for group in layout.feature_groups.values().filter(|g| !g.is_empty()) {
        let chosen: Expression = group.iter().map(|&i| handles[i]).sum();
        problem = problem.with(constraint!(chosen <= 1.0));
    }

    if let Some(max) = layout.max_features_to_vary {
        let all_main: Expression = layout
            .feature_groups
            .values()
            .flatten()
            .map(|&i| handles[i])
            .sum();
        problem = problem.with(constraint!(all_main <= max as f64));
    }

    // z = x_first AND x_second
    for (spec, &z) in layout.variables.iter().zip(&handles) {
        if let VariableKind::And { first, second } = spec.kind {
            let (x_first, x_second) = (handles[first], handles[second]);
            problem = problem.with(constraint!(z <= x_first));
            problem = problem.with(constraint!(z <= x_second));
            problem = problem.with(constraint!(z >= x_first + x_second - 1.0));
        }
    }

    let total_gain: Expression = layout
        .variables
        .iter()
        .zip(&handles)
        .map(|(spec, var)| spec.score_gain * *var)
        .sum();
    let needed = layout.needed_score_gain;
    problem = match layout.direction {
        CfDirection::Increase => problem.with(constraint!(total_gain >= needed)),
        CfDirection::Decrease => problem.with(constraint!(total_gain <= needed)),
    };

    let solution = match problem.solve() {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) | Err(ResolutionError::Unbounded) => {
            return Ok(RoundOutcome::Infeasible)
        }
        Err(e) => return Err(CoachError::Solver(e.to_string())),
    };

    let active = layout
        .variables
        .iter()
        .zip(&handles)
        .filter(|(_, var)| solution.value(**var) > 0.5)
        .map(|(spec, _)| ActiveVariable {
            key: spec.key,
            score_gain: spec.score_gain,
            distance: spec.distance,
        })
        .collect();

    Ok(RoundOutcome::Optimal(RoundSolution::from_active(active)))
}
