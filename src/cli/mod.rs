//! CLI module - argument parsing and request files

pub mod args;
pub mod request;

pub use args::Cli;
pub use request::{apply_cli_overrides, categorical_cost, RequestFile};
