//! Planforge planning engine
//!
//! Ties the pipeline together: validation, decomposition, graph
//! construction, critical-path analysis, resource allocation and
//! prioritization produce a versioned `DecompositionResult`; the
//! change-impact engine re-plans incrementally with structural sharing of
//! unaffected tasks; the plan cache memoizes whole runs by specification
//! content hash.

pub mod cache;
pub mod change_impact;
pub mod error;
pub mod pipeline;
pub mod report;

pub use cache::{PlanCache, PlanCacheConfig};
pub use change_impact::{affected_tasks, ChangeImpactEngine};
pub use error::{PlanningError, Result};
pub use pipeline::{Planner, PlanningOptions};
pub use report::{build_recommendations, compute_metrics};
