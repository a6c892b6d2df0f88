//! Report module - presenting and exporting counterfactuals

pub mod counterfactuals;
pub mod export;
pub mod summary;

pub use counterfactuals::*;
pub use export::*;
pub use summary::*;
