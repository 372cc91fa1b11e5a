//! Structural validation of planning inputs

use std::collections::HashSet;

use crate::error::{Result, ValidationError};
use crate::models::ProjectSpecification;

/// Validates a specification before any processing begins.
///
/// Checks are purely structural: unique ids, resolvable dependency
/// references and in-range numeric fields. Semantic problems such as
/// dependency cycles are reported by later pipeline stages.
pub fn validate_specification(spec: &ProjectSpecification) -> Result<()> {
    if spec.requirements.is_empty() {
        return Err(ValidationError::EmptySpecification(spec.id.clone()));
    }

    let mut seen = HashSet::new();
    for requirement in &spec.requirements {
        if requirement.id.trim().is_empty() {
            return Err(ValidationError::InvalidRequirement {
                requirement: requirement.id.clone(),
                detail: "empty requirement id".to_string(),
            });
        }
        if requirement.id.contains('.') {
            return Err(ValidationError::InvalidRequirement {
                requirement: requirement.id.clone(),
                detail: "requirement ids may not contain '.', it is reserved for task split paths"
                    .to_string(),
            });
        }
        if !seen.insert(requirement.id.clone()) {
            return Err(ValidationError::DuplicateRequirement(requirement.id.clone()));
        }
        if let Some(hours) = requirement.estimated_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(ValidationError::InvalidRequirement {
                    requirement: requirement.id.clone(),
                    detail: format!("estimated_hours must be positive, got {}", hours),
                });
            }
        }
        if !(0.0..=100.0).contains(&requirement.business_value) {
            return Err(ValidationError::InvalidRequirement {
                requirement: requirement.id.clone(),
                detail: format!(
                    "business_value must be within 0-100, got {}",
                    requirement.business_value
                ),
            });
        }
    }

    let ids: HashSet<&str> = spec.requirements.iter().map(|r| r.id.as_str()).collect();
    for requirement in &spec.requirements {
        for dep in &requirement.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(ValidationError::UnknownRequirementDependency {
                    requirement: requirement.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }

    let mut resource_types = HashSet::new();
    for resource in &spec.resources {
        if resource.resource_type.trim().is_empty() {
            return Err(ValidationError::InvalidResource {
                resource: resource.resource_type.clone(),
                detail: "empty resource type".to_string(),
            });
        }
        if !resource_types.insert(resource.resource_type.clone()) {
            return Err(ValidationError::DuplicateResource(
                resource.resource_type.clone(),
            ));
        }
        if !resource.capacity.is_finite() || resource.capacity <= 0.0 {
            return Err(ValidationError::InvalidResource {
                resource: resource.resource_type.clone(),
                detail: format!("capacity must be positive, got {}", resource.capacity),
            });
        }
        if resource.cost_per_hour < 0.0 {
            return Err(ValidationError::InvalidResource {
                resource: resource.resource_type.clone(),
                detail: format!("cost_per_hour must not be negative, got {}", resource.cost_per_hour),
            });
        }
        if resource.calendar.bucket_hours <= 0.0 {
            return Err(ValidationError::InvalidResource {
                resource: resource.resource_type.clone(),
                detail: format!(
                    "calendar bucket_hours must be positive, got {}",
                    resource.calendar.bucket_hours
                ),
            });
        }
        if resource.calendar.default_capacity < 0.0
            || resource.calendar.capacity.iter().any(|c| *c < 0.0)
        {
            return Err(ValidationError::InvalidResource {
                resource: resource.resource_type.clone(),
                detail: "calendar capacity must not be negative".to_string(),
            });
        }
    }

    if let Some(deadline) = spec.constraints.deadline_hours {
        if !deadline.is_finite() || deadline <= 0.0 {
            return Err(ValidationError::InvalidConstraint(format!(
                "deadline_hours must be positive, got {}",
                deadline
            )));
        }
    }

    Ok(())
}
