//! Error types for decomposition

use thiserror::Error;

/// Errors raised while decomposing a specification into a task tree
#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("Containment conflict for unit '{unit}': {detail}")]
    ContainmentConflict { unit: String, detail: String },

    #[error("Invalid unit '{unit}': {detail}")]
    InvalidUnit { unit: String, detail: String },
}

/// Result type for decomposition operations
pub type Result<T> = std::result::Result<T, DecompositionError>;
