//! Interaction option expansion
//!
//! An interaction term over features A and B gets one option per pair of
//! main options `(a, b)`. Its gain is the joint score movement minus what the
//! two main options already claimed for this term, so selecting `a`, `b` and
//! their AND variable adds up to exactly the joint movement.

use super::catalog::{InteractionOption, MainOption};
use crate::model::{FeatureId, InteractionTerm};

/// Cross product of `first_options` x `second_options` for interaction
/// `interaction`, whose current contribution is `current_score`.
///
/// `first_options` must belong to `term.first` and `second_options` to
/// `term.second`.
pub fn expand_interaction(
    interaction: FeatureId,
    term: &InteractionTerm,
    current_score: f64,
    first_options: &[MainOption],
    second_options: &[MainOption],
) -> Vec<InteractionOption> {
    let mut options = Vec::with_capacity(first_options.len() * second_options.len());

    for a in first_options {
        for b in second_options {
            let joint_score = term.score_for(&a.target, &b.target);
            let score_gain =
                joint_score - current_score - a.offset_for(interaction) - b.offset_for(interaction);

            options.push(InteractionOption {
                targets: (a.target.clone(), b.target.clone()),
                score_gain,
                bins: (a.bin, b.bin),
                joint_bins: term.locate(&a.target, &b.target),
            });
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BinAxis, FeatureValue};
    use crate::pipeline::catalog::InteractionOffset;

    fn term() -> InteractionTerm {
        InteractionTerm {
            first: FeatureId(0),
            second: FeatureId(1),
            first_axis: BinAxis::Continuous(vec![0.0, 10.0]),
            second_axis: BinAxis::Categorical(vec!["a".into(), "b".into()]),
            scores: vec![vec![0.0, 0.1], vec![0.4, 1.0]],
        }
    }

    fn main_option(target: FeatureValue, bin: usize, offset: f64) -> MainOption {
        MainOption {
            target,
            score_gain: 0.0,
            distance: 1.0,
            bin,
            interaction_offsets: vec![InteractionOffset {
                interaction: FeatureId(2),
                score_gain: offset,
            }],
        }
    }

    #[test]
    fn test_expansion_removes_double_counting() {
        // Current row: (5.0, "a") -> joint score 0.0
        let a = main_option(FeatureValue::Number(10.0), 1, 0.4);
        let b = main_option(FeatureValue::Level("b".into()), 1, 0.1);

        let options = expand_interaction(FeatureId(2), &term(), 0.0, &[a.clone()], &[b.clone()]);
        assert_eq!(options.len(), 1);

        let option = &options[0];
        assert_eq!(option.bins, (1, 1));
        assert_eq!(option.joint_bins, Some((1, 1)));
        assert_eq!(option.distance(), 0.0);
        assert!((option.score_gain - 0.5).abs() < 1e-12);

        // Offsets plus correction equal the full joint movement
        let total = a.offset_for(FeatureId(2)) + b.offset_for(FeatureId(2)) + option.score_gain;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_expansion_is_cross_product() {
        let firsts = vec![
            main_option(FeatureValue::Number(10.0), 1, 0.4),
            main_option(FeatureValue::Number(20.0), 2, 0.4),
        ];
        let seconds = vec![main_option(FeatureValue::Level("b".into()), 1, 0.1)];
        let options = expand_interaction(FeatureId(2), &term(), 0.0, &firsts, &seconds);
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].bins, (2, 1));
    }
}
