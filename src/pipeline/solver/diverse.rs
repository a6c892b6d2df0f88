//! Diverse solution search
//!
//! A small state machine that solves the model repeatedly. After every
//! feasible round the main options it selected are muted, so the next round
//! has to find a different strategy. The muted set only grows.

use std::collections::BTreeSet;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::model::{solve_layout, ModelLayout, OptimizationModelBuilder};
use super::{ModelSize, RoundOutcome, VariableKey};
use crate::error::Result;
use crate::utils::progress::{advance_round, finish_with_success, finish_with_warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Building,
    Solving,
    Collecting,
    Done,
    /// The last solved round had no feasible assignment
    Infeasible,
}

/// Outcome of one finished round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub round: usize,
    pub outcome: RoundOutcome,
    pub size: ModelSize,
}

pub struct DiverseSolutionController<'a> {
    builder: OptimizationModelBuilder<'a>,
    total_rounds: usize,
    round: usize,
    state: ControllerState,
    muted: BTreeSet<VariableKey>,
    layout: Option<ModelLayout>,
    outcome: Option<RoundOutcome>,
    records: Vec<RoundRecord>,
    success: bool,
    progress: Option<ProgressBar>,
}

impl<'a> DiverseSolutionController<'a> {
    pub fn new(builder: OptimizationModelBuilder<'a>, total_rounds: usize) -> Self {
        Self {
            builder,
            total_rounds,
            round: 0,
            state: ControllerState::Building,
            muted: BTreeSet::new(),
            layout: None,
            outcome: None,
            records: Vec::with_capacity(total_rounds),
            success: true,
            progress: None,
        }
    }

    /// Report finished rounds on a progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn muted(&self) -> &BTreeSet<VariableKey> {
        &self.muted
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    /// False once any round failed to reach a feasible optimum
    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// Perform one state transition and return the new state
    pub fn step(&mut self) -> Result<ControllerState> {
        self.state = match self.state {
            ControllerState::Building => {
                if self.round >= self.total_rounds {
                    ControllerState::Done
                } else {
                    let layout = self.builder.layout(&self.muted);
                    debug!(
                        round = self.round + 1,
                        size = %layout.size(),
                        muted = self.muted.len(),
                        "Built counterfactual model"
                    );
                    self.layout = Some(layout);
                    ControllerState::Solving
                }
            }
            ControllerState::Solving => match self.layout.as_ref() {
                Some(layout) => {
                    let outcome = solve_layout(layout)?;
                    let next = match outcome {
                        RoundOutcome::Optimal(_) => ControllerState::Collecting,
                        RoundOutcome::Infeasible => ControllerState::Infeasible,
                    };
                    self.outcome = Some(outcome);
                    next
                }
                None => ControllerState::Building,
            },
            ControllerState::Collecting => {
                if let Some(RoundOutcome::Optimal(solution)) = &self.outcome {
                    info!(
                        round = self.round + 1,
                        objective = solution.objective,
                        score_gain = solution.score_gain,
                        changes = solution.active.iter().filter(|v| v.key.is_main()).count(),
                        "Found counterfactual"
                    );
                    self.muted
                        .extend(solution.active.iter().map(|v| v.key).filter(VariableKey::is_main));
                }
                self.finish_round();
                ControllerState::Building
            }
            ControllerState::Infeasible => {
                warn!(round = self.round + 1, "No feasible counterfactual in this round");
                self.success = false;
                self.finish_round();
                ControllerState::Building
            }
            ControllerState::Done => ControllerState::Done,
        };

        if self.state == ControllerState::Done {
            if let Some(pb) = &self.progress {
                let found = self
                    .records
                    .iter()
                    .filter(|r| matches!(r.outcome, RoundOutcome::Optimal(_)))
                    .count();
                if self.success {
                    finish_with_success(pb, &format!("Found {} strategies", found));
                } else {
                    finish_with_warning(pb, &format!("Found {} of {} strategies", found, self.total_rounds));
                }
            }
        }
        Ok(self.state)
    }

    fn finish_round(&mut self) {
        let size = self.layout.take().map(|l| l.size()).unwrap_or_default();
        if let Some(outcome) = self.outcome.take() {
            self.records.push(RoundRecord {
                round: self.round + 1,
                outcome,
                size,
            });
        }
        self.round += 1;
        if let Some(pb) = &self.progress {
            advance_round(pb, self.round, self.muted.len());
        }
    }

    /// Step until every round has been attempted
    pub fn run(mut self) -> Result<(Vec<RoundRecord>, bool)> {
        while self.step()? != ControllerState::Done {}
        Ok((self.records, self.success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureId, FeatureType, FeatureValue};
    use crate::pipeline::catalog::{CfDirection, MainOption, OptionCatalog};

    fn catalog() -> OptionCatalog {
        let option = |bin: usize, gain: f64, distance: f64| MainOption {
            target: FeatureValue::Number(bin as f64),
            score_gain: gain,
            distance,
            bin,
            interaction_offsets: Vec::new(),
        };
        let mut catalog = OptionCatalog::new();
        catalog.insert_main(
            FeatureId(0),
            FeatureType::Continuous,
            vec![option(1, 2.0, 1.0), option(2, 2.5, 2.0)],
        );
        catalog
    }

    fn features() -> BTreeSet<FeatureId> {
        [FeatureId(0)].into_iter().collect()
    }

    #[test]
    fn test_state_sequence() {
        let catalog = catalog();
        let builder = OptimizationModelBuilder::new(&catalog, CfDirection::Increase, 1.0, features());
        let mut controller = DiverseSolutionController::new(builder, 1);

        assert_eq!(controller.state(), ControllerState::Building);
        assert_eq!(controller.step().unwrap(), ControllerState::Solving);
        assert_eq!(controller.step().unwrap(), ControllerState::Collecting);
        assert_eq!(controller.step().unwrap(), ControllerState::Building);
        assert_eq!(controller.step().unwrap(), ControllerState::Done);
        assert_eq!(controller.step().unwrap(), ControllerState::Done);
        assert!(controller.is_successful());
        assert_eq!(controller.muted().len(), 1);
    }

    #[test]
    fn test_rounds_mute_and_then_fail() {
        let catalog = catalog();
        let builder = OptimizationModelBuilder::new(&catalog, CfDirection::Increase, 1.0, features());
        let (records, success) = DiverseSolutionController::new(builder, 3).run().unwrap();

        assert_eq!(records.len(), 3);
        assert!(!success);

        let chosen: Vec<Option<VariableKey>> = records
            .iter()
            .map(|r| match &r.outcome {
                RoundOutcome::Optimal(s) => s.active.first().map(|v| v.key),
                RoundOutcome::Infeasible => None,
            })
            .collect();
        assert_eq!(
            chosen,
            vec![
                Some(VariableKey::Main {
                    feature: FeatureId(0),
                    bin: 1
                }),
                Some(VariableKey::Main {
                    feature: FeatureId(0),
                    bin: 2
                }),
                None,
            ]
        );
        assert_eq!(records[2].round, 3);
    }
}
