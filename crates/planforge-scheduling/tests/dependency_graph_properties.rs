//! Property-based tests for dependency graph consistency and CPM bounds

use std::collections::BTreeMap;

use proptest::prelude::*;

use planforge_domain::{
    Dependency, EffortEstimate, Priority, Task, TaskKind, TaskStatus, TaskTree,
};
use planforge_scheduling::{
    CriticalPathAnalyzer, DependencyGraphBuilder, SchedulingError,
};

fn create_test_task(id: &str, hours: f64) -> Task {
    Task {
        id: id.to_string(),
        requirement_id: id.to_string(),
        name: format!("Task {}", id),
        parent: None,
        children: Vec::new(),
        kind: TaskKind::Task,
        effort: EffortEstimate {
            hours,
            confidence: 0.8,
        },
        duration_hours: hours,
        resource_requirements: Vec::new(),
        dependencies: Vec::new(),
        priority: Priority::Medium,
        status: TaskStatus::Pending,
        business_value: 50.0,
        risk_score: 2.0,
    }
}

fn create_flat_tree(durations: &[f64]) -> TaskTree {
    let mut tree = TaskTree::new();
    for (i, duration) in durations.iter().enumerate() {
        let task = create_test_task(&format!("T-{}", i), *duration);
        tree.roots.push(task.id.clone());
        tree.insert(task);
    }
    tree
}

/// Strategy for per-task durations
fn durations_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..40.0, 1..10)
}

/// Strategy for arbitrary (from, to) index pairs
fn edge_indices_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..10, 0usize..10), 0..20)
}

proptest! {
    /// Property: a built graph is acyclic and reflects every accepted edge.
    ///
    /// Forward edges (lower index depends on nothing later) can never form a
    /// cycle, so the build must succeed and report each edge.
    #[test]
    fn prop_forward_edges_build_acyclic_graph(
        durations in durations_strategy(),
        edge_indices in edge_indices_strategy(),
    ) {
        let tree = create_flat_tree(&durations);
        let count = durations.len();
        let edges: Vec<Dependency> = edge_indices
            .iter()
            .filter(|(from, to)| *from < count && *to < count && from < to)
            .map(|(from, to)| {
                Dependency::finish_to_start(format!("T-{}", to), format!("T-{}", from))
            })
            .collect();

        let graph = DependencyGraphBuilder::default()
            .build(&tree, &edges, &[])
            .expect("acyclic input must build");

        prop_assert!(graph.find_cycle().is_none());
        for edge in &edges {
            prop_assert!(
                graph
                    .predecessors_of(&edge.task_id)
                    .any(|e| e.depends_on == edge.depends_on),
                "edge {} -> {} missing",
                edge.depends_on,
                edge.task_id
            );
        }
    }

    /// Property: topological order places predecessors first
    #[test]
    fn prop_topological_sort_respects_dependencies(
        durations in durations_strategy(),
        edge_indices in edge_indices_strategy(),
    ) {
        let tree = create_flat_tree(&durations);
        let count = durations.len();
        let edges: Vec<Dependency> = edge_indices
            .iter()
            .filter(|(from, to)| *from < count && *to < count && from < to)
            .map(|(from, to)| {
                Dependency::finish_to_start(format!("T-{}", to), format!("T-{}", from))
            })
            .collect();

        let graph = DependencyGraphBuilder::default()
            .build(&tree, &edges, &[])
            .expect("build");
        let sorted = graph.topological_sort().expect("sort");
        prop_assert_eq!(sorted.len(), count);

        let positions: BTreeMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for edge in graph.edges() {
            prop_assert!(positions[edge.depends_on.as_str()] < positions[edge.task_id.as_str()]);
        }
    }

    /// Property: a closing edge turns the graph into a reported cycle.
    ///
    /// The error carries the exact cycle: a closed, non-empty id sequence.
    #[test]
    fn prop_back_edge_is_reported_as_cycle(
        durations in prop::collection::vec(1.0f64..40.0, 2..8),
    ) {
        let tree = create_flat_tree(&durations);
        let count = durations.len();
        let mut edges: Vec<Dependency> = (1..count)
            .map(|i| Dependency::finish_to_start(format!("T-{}", i), format!("T-{}", i - 1)))
            .collect();
        edges.push(Dependency::finish_to_start(
            "T-0".to_string(),
            format!("T-{}", count - 1),
        ));

        match DependencyGraphBuilder::default().build(&tree, &edges, &[]) {
            Err(SchedulingError::CycleDetected { cycle }) => {
                prop_assert!(cycle.len() >= 2);
                prop_assert_eq!(cycle.first(), cycle.last());
            }
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }

    /// Property: CPM bounds.
    ///
    /// Total duration is at least the longest single task and at most the
    /// sum of all tasks; slack is never negative.
    #[test]
    fn prop_cpm_duration_bounds(
        durations in durations_strategy(),
        edge_indices in edge_indices_strategy(),
    ) {
        let tree = create_flat_tree(&durations);
        let count = durations.len();
        let edges: Vec<Dependency> = edge_indices
            .iter()
            .filter(|(from, to)| *from < count && *to < count && from < to)
            .map(|(from, to)| {
                Dependency::finish_to_start(format!("T-{}", to), format!("T-{}", from))
            })
            .collect();

        let graph = DependencyGraphBuilder::default()
            .build(&tree, &edges, &[])
            .expect("build");
        let task_durations: BTreeMap<String, f64> = tree
            .tasks
            .values()
            .map(|t| (t.id.clone(), t.duration_hours))
            .collect();
        let result = CriticalPathAnalyzer::new()
            .analyze(&graph, &task_durations)
            .expect("analyze");

        let longest = durations.iter().cloned().fold(0.0_f64, f64::max);
        let sum: f64 = durations.iter().sum();
        prop_assert!(result.total_duration_hours >= longest - 1e-9);
        prop_assert!(result.total_duration_hours <= sum + 1e-9);

        for (id, slack) in &result.slack {
            prop_assert!(*slack >= -1e-9, "negative slack on {}", id);
        }
    }

    /// Property: every critical path spans the full project duration
    #[test]
    fn prop_critical_paths_span_total_duration(
        durations in durations_strategy(),
        edge_indices in edge_indices_strategy(),
    ) {
        let tree = create_flat_tree(&durations);
        let count = durations.len();
        let edges: Vec<Dependency> = edge_indices
            .iter()
            .filter(|(from, to)| *from < count && *to < count && from < to)
            .map(|(from, to)| {
                Dependency::finish_to_start(format!("T-{}", to), format!("T-{}", from))
            })
            .collect();

        let graph = DependencyGraphBuilder::default()
            .build(&tree, &edges, &[])
            .expect("build");
        let task_durations: BTreeMap<String, f64> = tree
            .tasks
            .values()
            .map(|t| (t.id.clone(), t.duration_hours))
            .collect();
        let result = CriticalPathAnalyzer::new()
            .analyze(&graph, &task_durations)
            .expect("analyze");

        prop_assert!(!result.paths.is_empty());
        for path in &result.paths {
            let finish = path
                .last()
                .and_then(|id| result.schedule.get(id))
                .map(|s| s.earliest_finish)
                .unwrap_or(0.0);
            prop_assert!((finish - result.total_duration_hours).abs() < 1e-9);
            for id in path {
                prop_assert!(result.slack[id].abs() < 1e-9);
            }
        }
    }
}
