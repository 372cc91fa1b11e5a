//! Planforge requirement decomposition
//!
//! Turns the requirements of a `ProjectSpecification` into a hierarchical
//! task tree: complexity scoring decides when a unit splits, per-domain
//! strategy tables decide how, and disjoint domain groups decompose in
//! parallel with a deterministic merge.

pub mod complexity;
pub mod decomposer;
pub mod error;
pub mod strategies;

pub use complexity::{ComplexityAnalyzer, SplitUnit};
pub use decomposer::{Decomposer, DecompositionOptions};
pub use error::{DecompositionError, Result};
pub use strategies::{strategy_for, DomainStrategy, PhaseTemplate};
