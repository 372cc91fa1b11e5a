//! Planforge scheduling
//!
//! Graph construction with cycle detection, critical-path (CPM) analysis,
//! constrained resource allocation and deterministic prioritization over a
//! decomposed task tree.

pub mod allocator;
pub mod critical_path;
pub mod error;
pub mod graph;
pub mod prioritization;

pub use allocator::{AllocationContext, AllocationOptions, ResourceAllocator, SolverKind};
pub use critical_path::CriticalPathAnalyzer;
pub use error::{Result, SchedulingError};
pub use graph::{DependencyGraph, DependencyGraphBuilder, GraphOptions};
pub use prioritization::{PrioritizationEngine, PriorityWeights};
