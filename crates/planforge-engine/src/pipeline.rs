//! The planning pipeline
//!
//! Validate, decompose, build the dependency graph, run CPM, allocate
//! resources, run CPM again with assigned calendars, prioritize, and
//! assemble a versioned immutable result.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use planforge_decomposition::{Decomposer, DecompositionOptions};
use planforge_domain::{
    spec_hash, validate_specification, DecompositionResult, Dependency, ProjectSpecification,
    ResourceSpecification, TaskTree, SCHEMA_VERSION,
};
use planforge_scheduling::{
    AllocationContext, AllocationOptions, CriticalPathAnalyzer, DependencyGraph,
    DependencyGraphBuilder, GraphOptions, PrioritizationEngine, PriorityWeights, ResourceAllocator,
};

use crate::cache::PlanCache;
use crate::error::Result;
use crate::report;

/// Options for every pipeline stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningOptions {
    /// Decomposer tunables
    #[serde(default)]
    pub decomposition: DecompositionOptions,
    /// Graph construction policy
    #[serde(default)]
    pub graph: GraphOptions,
    /// Allocation search tunables
    #[serde(default)]
    pub allocation: AllocationOptions,
    /// Prioritization weights
    #[serde(default)]
    pub weights: PriorityWeights,
}

/// Output of the scheduling stages over a finished task tree
pub(crate) struct ScheduledStages {
    pub graph: DependencyGraph,
    pub critical_path: planforge_domain::CriticalPathResult,
    pub resource_plan: planforge_domain::ResourcePlan,
    pub prioritized_order: Vec<String>,
}

/// Runs the full planning pipeline for one specification
#[derive(Debug, Clone, Default)]
pub struct Planner {
    options: PlanningOptions,
}

impl Planner {
    /// Creates a planner with the given options
    pub fn new(options: PlanningOptions) -> Self {
        Self { options }
    }

    /// Plans a specification, producing version 1 of a decomposition result
    pub fn plan(&self, spec: &ProjectSpecification) -> Result<DecompositionResult> {
        self.plan_cancellable(spec, None)
    }

    /// Plans with cooperative cancellation of the allocation search.
    ///
    /// Cancellation degrades the plan to best-effort (flagged partial); it
    /// never aborts with an error once a feasible allocation exists.
    pub fn plan_cancellable(
        &self,
        spec: &ProjectSpecification,
        cancel: Option<&CancellationToken>,
    ) -> Result<DecompositionResult> {
        validate_specification(spec)?;

        let tree = Decomposer::new(self.options.decomposition.clone()).decompose(spec)?;
        let stages = schedule_tree(&tree, spec, &self.options, BTreeMap::new(), cancel)?;
        let result = assemble(spec, tree, stages, 1);
        info!(
            result_id = %result.id,
            tasks = result.metrics.total_tasks,
            duration = result.critical_path.total_duration_hours,
            "planning complete"
        );
        Ok(result)
    }

    /// Plans through an explicit cache keyed by specification content hash
    pub fn plan_with_cache(
        &self,
        spec: &ProjectSpecification,
        cache: &mut PlanCache,
    ) -> Result<DecompositionResult> {
        let key = spec_hash(spec);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached.clone());
        }
        let result = self.plan(spec)?;
        cache.insert(key, result.clone());
        Ok(result)
    }
}

/// Runs graph construction, both CPM passes, allocation and prioritization.
///
/// CPM runs twice: once with the default calendar to seed the allocator's
/// ordering heuristic, and once post-allocation with the assigned resource
/// calendars, which is the result that gets published.
pub(crate) fn schedule_tree(
    tree: &TaskTree,
    spec: &ProjectSpecification,
    options: &PlanningOptions,
    pinned_start_hours: BTreeMap<String, f64>,
    cancel: Option<&CancellationToken>,
) -> Result<ScheduledStages> {
    let explicit = requirement_edges(spec);
    let graph = DependencyGraphBuilder::new(options.graph).build(tree, &explicit, &spec.resources)?;

    let analyzer = CriticalPathAnalyzer::new();
    let pre_allocation = analyzer.analyze(&graph, &default_durations(tree))?;

    let allocator = ResourceAllocator::new(options.allocation.clone());
    let resource_plan = allocator.allocate(&AllocationContext {
        tree,
        resources: &spec.resources,
        graph: &graph,
        critical_path: &pre_allocation,
        objective: spec.objective,
        deadline_hours: spec.constraints.deadline_hours,
        pinned_start_hours,
        cancel,
    })?;

    let critical_path = analyzer.analyze(&graph, &calendar_durations(tree, &spec.resources))?;
    let prioritized_order =
        PrioritizationEngine::new(options.weights).prioritize(tree, &critical_path);

    Ok(ScheduledStages {
        graph,
        critical_path,
        resource_plan,
        prioritized_order,
    })
}

/// Assembles the immutable versioned result
pub(crate) fn assemble(
    spec: &ProjectSpecification,
    tree: TaskTree,
    stages: ScheduledStages,
    version: u32,
) -> DecompositionResult {
    let metrics = report::compute_metrics(&tree);
    let recommendations =
        report::build_recommendations(spec, &tree, &stages.critical_path, &stages.resource_plan);

    DecompositionResult {
        id: Uuid::new_v4(),
        version,
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        spec: spec.clone(),
        spec_hash: spec_hash(spec),
        tree,
        graph: stages.graph.snapshot(),
        critical_path: stages.critical_path,
        resource_plan: stages.resource_plan,
        prioritized_order: stages.prioritized_order,
        metrics,
        recommendations,
    }
}

/// Requirement-level dependencies expressed as edges between root tasks
pub(crate) fn requirement_edges(spec: &ProjectSpecification) -> Vec<Dependency> {
    spec.requirements
        .iter()
        .flat_map(|requirement| {
            requirement
                .depends_on
                .iter()
                .map(|dep| Dependency::finish_to_start(requirement.id.clone(), dep.clone()))
        })
        .collect()
}

/// Leaf durations under the default calendar
pub(crate) fn default_durations(tree: &TaskTree) -> BTreeMap<String, f64> {
    tree.tasks
        .values()
        .filter(|t| t.is_leaf())
        .map(|t| (t.id.clone(), t.duration_hours))
        .collect()
}

/// Leaf durations under each task's assigned resource calendars; the
/// slowest required resource stretches the task
pub(crate) fn calendar_durations(
    tree: &TaskTree,
    resources: &[ResourceSpecification],
) -> BTreeMap<String, f64> {
    tree.tasks
        .values()
        .filter(|t| t.is_leaf())
        .map(|task| {
            let duration = task
                .resource_requirements
                .iter()
                .filter_map(|req| {
                    resources
                        .iter()
                        .find(|r| r.resource_type == req.resource_type)
                        .map(|r| r.calendar.duration_hours(task.effort.hours))
                })
                .fold(task.duration_hours, f64::max);
            (task.id.clone(), duration)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planforge_domain::{
        Domain, PlanningConstraints, Priority, Requirement, RiskLevel, TaskStatus,
    };

    fn create_test_requirement(id: &str, hours: f64, depends_on: Vec<String>) -> Requirement {
        Requirement {
            id: id.to_string(),
            name: format!("Requirement {}", id),
            description: String::new(),
            domain: Domain::Backend,
            priority: Priority::Medium,
            estimated_hours: Some(hours),
            depends_on,
            risk: RiskLevel::Low,
            business_value: 50.0,
        }
    }

    fn create_test_spec() -> ProjectSpecification {
        ProjectSpecification {
            id: "spec-1".to_string(),
            requirements: vec![
                create_test_requirement("REQ-1", 8.0, Vec::new()),
                create_test_requirement("REQ-2", 6.0, vec!["REQ-1".to_string()]),
            ],
            resources: vec![ResourceSpecification::uniform("backend", 2.0)],
            objective: Default::default(),
            constraints: PlanningConstraints::default(),
        }
    }

    #[test]
    fn test_plan_produces_version_one() {
        let result = Planner::default().plan(&create_test_spec()).expect("plan");

        assert_eq!(result.version, 1);
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.metrics.total_tasks, 2);
        assert_eq!(result.prioritized_order.len(), 2);
        assert!(result
            .tree
            .tasks
            .values()
            .all(|t| t.status == TaskStatus::Pending));
    }

    #[test]
    fn test_requirement_dependency_orders_schedule() {
        let result = Planner::default().plan(&create_test_spec()).expect("plan");

        let first = &result.critical_path.schedule["REQ-1"];
        let second = &result.critical_path.schedule["REQ-2"];
        assert!(second.earliest_start >= first.earliest_finish - 1e-9);
        assert!((result.critical_path.total_duration_hours - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_with_cache_hits_on_identical_spec() {
        let planner = Planner::default();
        let spec = create_test_spec();
        let mut cache = PlanCache::new();

        let first = planner.plan_with_cache(&spec, &mut cache).expect("first");
        let second = planner.plan_with_cache(&spec, &mut cache).expect("second");

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        // The cached result is returned as-is, same id and timestamp.
        assert_eq!(first, second);
    }

    #[test]
    fn test_validation_failure_propagates() {
        let mut spec = create_test_spec();
        spec.requirements.clear();
        assert!(matches!(
            Planner::default().plan(&spec),
            Err(crate::error::PlanningError::Validation(_))
        ));
    }
}
