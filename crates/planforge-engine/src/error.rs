//! Error types for the planning pipeline

use thiserror::Error;

use planforge_decomposition::DecompositionError;
use planforge_domain::ValidationError;
use planforge_scheduling::SchedulingError;

/// Errors surfaced by the planning pipeline.
///
/// Structural errors from earlier stages pass through unmodified; callers
/// can match on the wrapped variant to recover the offending input detail.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Decomposition failed: {0}")]
    Decomposition(#[from] DecompositionError),

    #[error("Scheduling failed: {0}")]
    Scheduling(#[from] SchedulingError),
}

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanningError>;
