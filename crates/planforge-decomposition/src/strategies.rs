//! Domain-specific splitting strategies
//!
//! Each engineering domain decomposes along its own phase template. The
//! table is a plain match on the domain enum; adding a domain means adding
//! a table entry, not a new type.

use planforge_domain::{Domain, SkillLevel};

/// One phase of a domain's split template
#[derive(Debug, Clone, Copy)]
pub struct PhaseTemplate {
    /// Phase name, appended to the parent unit's name
    pub name: &'static str,
    /// Share of the parent's effort assigned to this phase
    pub fraction: f64,
    /// Resource type the phase demands
    pub resource_type: &'static str,
    /// Skill level the phase demands
    pub skill: SkillLevel,
}

/// How a domain splits a unit into phases
#[derive(Debug, Clone, Copy)]
pub struct DomainStrategy {
    /// Phases in execution order; fractions sum to 1.0
    pub phases: &'static [PhaseTemplate],
    /// Resource type for units that never split
    pub default_resource: &'static str,
}

const FRONTEND: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Component structure",
            fraction: 0.25,
            resource_type: "frontend",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "State and data flow",
            fraction: 0.30,
            resource_type: "frontend",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Interaction logic",
            fraction: 0.25,
            resource_type: "frontend",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Styling and polish",
            fraction: 0.20,
            resource_type: "frontend",
            skill: SkillLevel::Junior,
        },
    ],
    default_resource: "frontend",
};

const BACKEND: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Interface design",
            fraction: 0.20,
            resource_type: "backend",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Data access",
            fraction: 0.25,
            resource_type: "backend",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Service logic",
            fraction: 0.35,
            resource_type: "backend",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Integration hardening",
            fraction: 0.20,
            resource_type: "backend",
            skill: SkillLevel::Senior,
        },
    ],
    default_resource: "backend",
};

const DATABASE: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Schema design",
            fraction: 0.30,
            resource_type: "database",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Migration scripts",
            fraction: 0.30,
            resource_type: "database",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Query tuning",
            fraction: 0.40,
            resource_type: "database",
            skill: SkillLevel::Senior,
        },
    ],
    default_resource: "database",
};

const INFRASTRUCTURE: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Environment provisioning",
            fraction: 0.35,
            resource_type: "infrastructure",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Pipeline automation",
            fraction: 0.40,
            resource_type: "infrastructure",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Observability hooks",
            fraction: 0.25,
            resource_type: "infrastructure",
            skill: SkillLevel::Mid,
        },
    ],
    default_resource: "infrastructure",
};

const TESTING: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Test design",
            fraction: 0.30,
            resource_type: "testing",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Test implementation",
            fraction: 0.50,
            resource_type: "testing",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Stabilization",
            fraction: 0.20,
            resource_type: "testing",
            skill: SkillLevel::Mid,
        },
    ],
    default_resource: "testing",
};

const DOCUMENTATION: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Outline",
            fraction: 0.25,
            resource_type: "documentation",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Drafting",
            fraction: 0.50,
            resource_type: "documentation",
            skill: SkillLevel::Junior,
        },
        PhaseTemplate {
            name: "Review pass",
            fraction: 0.25,
            resource_type: "documentation",
            skill: SkillLevel::Senior,
        },
    ],
    default_resource: "documentation",
};

const GENERAL: DomainStrategy = DomainStrategy {
    phases: &[
        PhaseTemplate {
            name: "Analysis",
            fraction: 0.30,
            resource_type: "general",
            skill: SkillLevel::Senior,
        },
        PhaseTemplate {
            name: "Execution",
            fraction: 0.50,
            resource_type: "general",
            skill: SkillLevel::Mid,
        },
        PhaseTemplate {
            name: "Verification",
            fraction: 0.20,
            resource_type: "general",
            skill: SkillLevel::Mid,
        },
    ],
    default_resource: "general",
};

/// Looks up the splitting strategy for a domain
pub fn strategy_for(domain: Domain) -> &'static DomainStrategy {
    match domain {
        Domain::Frontend => &FRONTEND,
        Domain::Backend => &BACKEND,
        Domain::Database => &DATABASE,
        Domain::Infrastructure => &INFRASTRUCTURE,
        Domain::Testing => &TESTING,
        Domain::Documentation => &DOCUMENTATION,
        Domain::General => &GENERAL,
    }
}
