//! Error types for scheduling

use thiserror::Error;

/// Errors raised while building graphs, analyzing paths or allocating
/// resources
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Task '{0}' not found in the task tree")]
    UnknownTask(String),

    #[error("Dependency from '{task}' to '{depends_on}' conflicts with the task hierarchy")]
    HierarchyConflict { task: String, depends_on: String },

    #[error("No feasible assignment for resource '{resource}': {detail}")]
    Infeasible {
        resource: String,
        bucket: Option<u32>,
        detail: String,
    },
}

/// Result type for scheduling operations
pub type Result<T> = std::result::Result<T, SchedulingError>;
