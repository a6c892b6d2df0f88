//! GAM Coach: counterfactual strategies for generalized additive models
//!
//! Given a model, an input row and a desired outcome, the library searches
//! for the cheapest sets of feature changes that flip the prediction (or move
//! it into a target range), solving a small integer program per strategy.

pub mod cli;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{CoachError, Result};
pub use model::{AdditiveModel, Feature, FeatureId, FeatureValue, Gam, ModelKind};
pub use pipeline::{CfRequest, GamCoach};
pub use report::Counterfactuals;
