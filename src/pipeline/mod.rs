//! Pipeline module - turns an input row into counterfactual strategies

pub mod catalog;
pub mod coach;
pub mod interaction;
pub mod loader;
pub mod options;
pub mod reference;
pub mod solver;

pub use catalog::{CfDirection, InteractionOption, MainOption, OptionCatalog};
pub use coach::{CategoricalWeight, CfRequest, GamCoach, SearchGoal, Similarity};
pub use loader::*;
pub use options::FeatureRange;
pub use reference::{CategoricalCost, ReferenceStats};
pub use solver::{ModelSize, RoundOutcome, VariableKey};
