//! Property-based tests for decomposition determinism and tree shape

use proptest::prelude::*;

use planforge_decomposition::{Decomposer, DecompositionOptions};
use planforge_domain::{
    Domain, PlanningConstraints, Priority, ProjectSpecification, Requirement, RiskLevel,
};

fn domain_strategy() -> impl Strategy<Value = Domain> {
    prop_oneof![
        Just(Domain::Frontend),
        Just(Domain::Backend),
        Just(Domain::Database),
        Just(Domain::Testing),
        Just(Domain::General),
    ]
}

fn risk_strategy() -> impl Strategy<Value = RiskLevel> {
    prop_oneof![
        Just(RiskLevel::Low),
        Just(RiskLevel::Medium),
        Just(RiskLevel::High),
    ]
}

fn requirement_strategy(index: usize) -> impl Strategy<Value = Requirement> {
    (
        domain_strategy(),
        proptest::option::of(1.0f64..120.0),
        risk_strategy(),
        0.0f64..100.0,
    )
        .prop_map(move |(domain, hours, risk, business_value)| Requirement {
            id: format!("REQ-{}", index),
            name: format!("Requirement {}", index),
            description: String::new(),
            domain,
            priority: Priority::Medium,
            estimated_hours: hours,
            depends_on: Vec::new(),
            risk,
            business_value,
        })
}

fn spec_strategy() -> impl Strategy<Value = ProjectSpecification> {
    (1usize..6).prop_flat_map(|count| {
        let requirements: Vec<_> = (0..count).map(requirement_strategy).collect();
        requirements.prop_map(|requirements| ProjectSpecification {
            id: "prop-spec".to_string(),
            requirements,
            resources: Vec::new(),
            objective: Default::default(),
            constraints: PlanningConstraints::default(),
        })
    })
}

proptest! {
    /// Property: decomposition is idempotent.
    ///
    /// Two runs over an identical specification produce trees with identical
    /// ids, structure and estimates.
    #[test]
    fn prop_decomposition_is_idempotent(spec in spec_strategy()) {
        let decomposer = Decomposer::new(DecompositionOptions::default());
        let first = decomposer.decompose(&spec).expect("first run");
        let second = decomposer.decompose(&spec).expect("second run");
        prop_assert_eq!(first, second);
    }

    /// Property: parallel and sequential decomposition agree.
    ///
    /// Domain groups merge in specification order, never completion order.
    #[test]
    fn prop_parallel_merge_is_deterministic(spec in spec_strategy()) {
        let parallel = Decomposer::new(DecompositionOptions::default())
            .decompose(&spec)
            .expect("parallel");
        let sequential = Decomposer::new(DecompositionOptions {
            parallel: false,
            ..Default::default()
        })
        .decompose(&spec)
        .expect("sequential");
        prop_assert_eq!(parallel, sequential);
    }

    /// Property: the tree is well-formed.
    ///
    /// Every child lists its parent, every parent lists its children, every
    /// task id extends its requirement id, and depth stays within bounds.
    #[test]
    fn prop_tree_is_well_formed(spec in spec_strategy()) {
        let options = DecompositionOptions::default();
        let tree = Decomposer::new(options.clone()).decompose(&spec).expect("decompose");

        prop_assert_eq!(tree.roots.len(), spec.requirements.len());
        prop_assert!(tree.max_depth() <= options.max_depth);

        for task in tree.tasks.values() {
            match &task.parent {
                Some(parent_id) => {
                    let parent = tree.get(parent_id).expect("parent exists");
                    prop_assert!(parent.children.contains(&task.id));
                    prop_assert!(task.id.starts_with(parent_id.as_str()));
                }
                None => prop_assert!(tree.roots.contains(&task.id)),
            }
            for child in &task.children {
                let child_task = tree.get(child).expect("child exists");
                prop_assert_eq!(child_task.parent.as_ref(), Some(&task.id));
            }
            prop_assert_eq!(
                &task.requirement_id,
                &task.id.split('.').next().expect("stem").to_string()
            );
        }
    }

    /// Property: splitting conserves effort.
    ///
    /// A parent's children account for exactly the parent's effort; leaves
    /// carry positive effort, never a silent zero.
    #[test]
    fn prop_split_conserves_effort(spec in spec_strategy()) {
        let tree = Decomposer::new(DecompositionOptions::default())
            .decompose(&spec)
            .expect("decompose");

        for task in tree.tasks.values() {
            if task.is_leaf() {
                prop_assert!(task.effort.hours > 0.0);
            } else {
                let children_effort: f64 = task
                    .children
                    .iter()
                    .map(|c| tree.get(c).expect("child").effort.hours)
                    .sum();
                prop_assert!((children_effort - task.effort.hours).abs() < 1e-6);
            }
        }
    }

    /// Property: only leaves demand resources
    #[test]
    fn prop_only_leaves_demand_resources(spec in spec_strategy()) {
        let tree = Decomposer::new(DecompositionOptions::default())
            .decompose(&spec)
            .expect("decompose");

        for task in tree.tasks.values() {
            if task.is_leaf() {
                prop_assert!(!task.resource_requirements.is_empty());
            } else {
                prop_assert!(task.resource_requirements.is_empty());
            }
        }
    }
}
