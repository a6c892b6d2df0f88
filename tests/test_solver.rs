//! Tests for the optimization model and diverse solution search

mod common;

use std::collections::{BTreeSet, HashSet};

use gamcoach::model::{AdditiveModel, FeatureId};
use gamcoach::pipeline::solver::{DiverseSolutionController, OptimizationModelBuilder, VariableKind};
use gamcoach::pipeline::{CfRequest, GamCoach, RoundOutcome, VariableKey};
use gamcoach::report::Counterfactuals;

const INTERACTION: FeatureId = FeatureId(4);

fn loan_cfs(total: usize) -> Counterfactuals {
    let coach = GamCoach::new(common::loan_model(), common::loan_reference_stats());
    coach
        .generate_cfs(&common::loan_row(), &CfRequest::new(total))
        .unwrap()
}

fn main_features() -> BTreeSet<FeatureId> {
    (0..4).map(FeatureId).collect()
}

#[test]
fn test_at_most_one_option_per_feature() {
    let cfs = loan_cfs(3);
    assert!(!cfs.is_empty());

    for cf in &cfs.solutions {
        let mut seen = HashSet::new();
        for key in cf.active.iter().filter(|k| k.is_main()) {
            assert!(seen.insert(key.feature()), "feature {} changed twice", key.feature());
        }
        assert_eq!(seen.len(), cf.changes.len());
    }
}

#[test]
fn test_interaction_variables_are_and_of_constituents() {
    let cfs = loan_cfs(3);

    for cf in &cfs.solutions {
        let active: HashSet<VariableKey> = cf.active.iter().copied().collect();

        for option in cfs.catalog.interaction_options(INTERACTION) {
            let first = VariableKey::Main {
                feature: FeatureId(0),
                bin: option.bins.0,
            };
            let second = VariableKey::Main {
                feature: FeatureId(2),
                bin: option.bins.1,
            };
            let joint = VariableKey::Interaction {
                feature: INTERACTION,
                bins: option.bins,
            };
            let both = active.contains(&first) && active.contains(&second);
            assert_eq!(active.contains(&joint), both, "AND mismatch for {}", joint);
        }
    }
}

#[test]
fn test_score_gain_meets_threshold() {
    let cfs = loan_cfs(3);
    for cf in &cfs.solutions {
        assert!(cfs.direction.is_satisfied(cf.score_gain + 1e-9, cfs.needed_score_gain));
    }
}

#[test]
fn test_score_gain_matches_model() {
    let gam = common::loan_model();
    let original = gam.predict_score(&common::loan_row());
    let cfs = loan_cfs(3);

    for cf in &cfs.solutions {
        let actual = gam.predict_score(&cf.row) - original;
        assert!(
            (actual - cf.score_gain).abs() < 1e-9,
            "model gain {} vs optimizer gain {}",
            actual,
            cf.score_gain
        );
    }
}

#[test]
fn test_classifier_counterfactual_flips_class() {
    let gam = common::loan_model();
    assert_eq!(gam.predict(&common::loan_row()), 0.0);

    let cfs = loan_cfs(1);
    assert!(cfs.is_successful());
    assert_eq!(cfs.len(), 1);
    assert!(!cfs.solutions[0].is_empty());
    assert_eq!(cfs.new_predictions(&gam), vec![1.0]);
}

#[test]
fn test_muted_options_are_not_reused() {
    let cfs = loan_cfs(3);
    let mut used: HashSet<VariableKey> = HashSet::new();

    for cf in &cfs.solutions {
        for key in cf.active.iter().filter(|k| k.is_main()) {
            assert!(used.insert(*key), "{} reused in a later strategy", key);
        }
    }
}

#[test]
fn test_generation_is_deterministic() {
    let first = loan_cfs(2);
    let second = loan_cfs(2);
    assert_eq!(first.solutions[0], second.solutions[0]);
    assert_eq!(first.to_rows(), second.to_rows());
}

#[test]
fn test_feature_cap_limits_changes() {
    let coach = GamCoach::new(common::loan_model(), common::loan_reference_stats());
    let request = CfRequest::new(2).with_max_features_to_vary(2);
    let cfs = coach.generate_cfs(&common::loan_row(), &request).unwrap();

    for cf in &cfs.solutions {
        assert!(cf.changes.len() <= 2);
    }
}

#[test]
fn test_features_to_vary_restricts_changes() {
    let coach = GamCoach::new(common::loan_model(), common::loan_reference_stats());
    let request = CfRequest::new(2).with_features_to_vary(["loan_amnt", "annual_inc"]);
    let cfs = coach.generate_cfs(&common::loan_row(), &request).unwrap();

    assert_eq!(cfs.catalog.interaction_option_count(), 0);
    for cf in &cfs.solutions {
        assert!(cf
            .changes
            .iter()
            .all(|c| c.feature == "loan_amnt" || c.feature == "annual_inc"));
    }
}

#[test]
fn test_builder_layout_on_real_catalog() {
    let cfs = loan_cfs(1);
    let builder = OptimizationModelBuilder::new(
        &cfs.catalog,
        cfs.direction,
        cfs.needed_score_gain,
        main_features(),
    );
    let layout = builder.layout(&BTreeSet::new());

    assert_eq!(layout.size(), cfs.model_size);
    assert_eq!(
        layout.variables.len(),
        cfs.catalog.main_option_count() + cfs.catalog.interaction_option_count()
    );

    for spec in &layout.variables {
        if let VariableKind::And { first, second } = spec.kind {
            assert!(layout.variables[first].key.is_main());
            assert!(layout.variables[second].key.is_main());
            assert_eq!(spec.distance, 0.0);
        }
    }
}

#[test]
fn test_controller_mutes_only_main_variables() {
    let cfs = loan_cfs(1);
    let builder = OptimizationModelBuilder::new(
        &cfs.catalog,
        cfs.direction,
        cfs.needed_score_gain,
        main_features(),
    );
    let mut controller = DiverseSolutionController::new(builder, 2);
    while controller.step().unwrap() != gamcoach::pipeline::solver::ControllerState::Done {}

    assert!(controller.muted().iter().all(|k| k.is_main()));
    assert_eq!(controller.records().len(), 2);
    if let RoundOutcome::Optimal(solution) = &controller.records()[0].outcome {
        for variable in solution.active.iter().filter(|v| v.key.is_main()) {
            assert!(controller.muted().contains(&variable.key));
        }
    }
}
