//! Shared fixtures for the integration tests and benchmarks

use planforge_domain::{
    Domain, PlanningConstraints, Priority, ProjectSpecification, Requirement,
    ResourceSpecification, RiskLevel,
};

/// A requirement with sensible defaults for scenario tests
pub fn requirement(id: &str, domain: Domain, hours: Option<f64>) -> Requirement {
    Requirement {
        id: id.to_string(),
        name: format!("Requirement {}", id),
        description: String::new(),
        domain,
        priority: Priority::Medium,
        estimated_hours: hours,
        depends_on: Vec::new(),
        risk: RiskLevel::Low,
        business_value: 50.0,
    }
}

/// A specification over the given requirements with one uniform resource
/// pool per domain the requirements mention
pub fn specification(id: &str, requirements: Vec<Requirement>) -> ProjectSpecification {
    let mut resources: Vec<ResourceSpecification> = Vec::new();
    for req in &requirements {
        let resource_type = match req.domain {
            Domain::Frontend => "frontend",
            Domain::Backend => "backend",
            Domain::Database => "database",
            Domain::Infrastructure => "infrastructure",
            Domain::Testing => "testing",
            Domain::Documentation => "documentation",
            Domain::General => "general",
        };
        if !resources.iter().any(|r| r.resource_type == resource_type) {
            resources.push(ResourceSpecification::uniform(resource_type, 4.0));
        }
    }

    ProjectSpecification {
        id: id.to_string(),
        requirements,
        resources,
        objective: Default::default(),
        constraints: PlanningConstraints::default(),
    }
}

/// A wide specification for benchmarking: `count` independent backend
/// requirements of mixed size
pub fn wide_specification(count: usize) -> ProjectSpecification {
    let requirements = (1..=count)
        .map(|i| {
            requirement(
                &format!("REQ-{:03}", i),
                Domain::Backend,
                Some(4.0 + (i % 5) as f64 * 8.0),
            )
        })
        .collect();
    specification("bench-spec", requirements)
}
