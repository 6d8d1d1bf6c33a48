//! Ensemble construction module
//!
//! Provides:
//! - Stacking of per-trial out-of-fold predictions
//! - Greedy (Caruana-style) weighted ensemble selection

mod greedy;
mod oof;

pub use greedy::GreedyEnsemble;
pub use oof::{stack_oof, StackedOof};
