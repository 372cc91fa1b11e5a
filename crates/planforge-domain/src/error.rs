//! Error types for the planning domain model

use thiserror::Error;

use crate::models::TaskStatus;

/// Errors raised while validating planning inputs
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Specification '{0}' contains no requirements")]
    EmptySpecification(String),

    #[error("Duplicate requirement id: {0}")]
    DuplicateRequirement(String),

    #[error("Requirement '{requirement}' depends on unknown requirement '{depends_on}'")]
    UnknownRequirementDependency {
        requirement: String,
        depends_on: String,
    },

    #[error("Requirement '{requirement}': {detail}")]
    InvalidRequirement { requirement: String, detail: String },

    #[error("Resource '{resource}': {detail}")]
    InvalidResource { resource: String, detail: String },

    #[error("Duplicate resource type: {0}")]
    DuplicateResource(String),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, ValidationError>;
