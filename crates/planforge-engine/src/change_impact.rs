//! Incremental re-planning from a prior result and a change-set
//!
//! Only the subgraph affected by a change is re-derived; tasks outside it
//! are carried into the new version by value, so their ids, content hashes
//! and lifecycle statuses survive. A new version is produced atomically or
//! not at all; the prior version is never touched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use planforge_decomposition::Decomposer;
use planforge_domain::{
    validate_specification, ChangeSet, DecompositionResult, ProjectSpecification,
    RequirementChange, ResourceChange, Task, TaskTree, ValidationError,
};

use crate::error::Result;
use crate::pipeline::{assemble, schedule_tree, PlanningOptions};

/// Recomputes a plan after requirement or resource edits
#[derive(Debug, Clone, Default)]
pub struct ChangeImpactEngine {
    options: PlanningOptions,
}

impl ChangeImpactEngine {
    /// Creates an engine with the given pipeline options
    pub fn new(options: PlanningOptions) -> Self {
        Self { options }
    }

    /// Produces version n+1 of a plan from version n and a change-set.
    ///
    /// An empty change-set returns a result identical to `prior` except for
    /// the result id, version and creation timestamp. Any stage error
    /// propagates unchanged and no new version is produced.
    pub fn recompose(
        &self,
        prior: &DecompositionResult,
        changes: &ChangeSet,
    ) -> Result<DecompositionResult> {
        self.recompose_cancellable(prior, changes, None)
    }

    /// `recompose` with cooperative cancellation of the allocation search
    pub fn recompose_cancellable(
        &self,
        prior: &DecompositionResult,
        changes: &ChangeSet,
        cancel: Option<&CancellationToken>,
    ) -> Result<DecompositionResult> {
        if changes.is_empty() {
            let mut bumped = prior.clone();
            bumped.id = Uuid::new_v4();
            bumped.version = prior.version + 1;
            bumped.created_at = Utc::now();
            return Ok(bumped);
        }

        let spec = apply_changes(&prior.spec, changes)?;
        validate_specification(&spec)?;

        let affected = affected_tasks(prior, changes);
        let affected_requirements: BTreeSet<String> = changes
            .touched_requirements()
            .into_iter()
            .chain(affected.iter().filter_map(|id| {
                prior.tree.get(id).map(|t| t.requirement_id.clone())
            }))
            .collect();
        debug!(
            affected_tasks = affected.len(),
            affected_requirements = affected_requirements.len(),
            "change impact computed"
        );

        let fresh = Decomposer::new(self.options.decomposition.clone()).decompose(&spec)?;
        let tree = merge_with_sharing(&prior.tree, fresh, &affected_requirements);

        // Unaffected tasks keep their prior start as an allocation warm
        // start; the allocator drops any pin that became infeasible.
        let pinned_start_hours: BTreeMap<String, f64> = prior
            .resource_plan
            .allocations
            .iter()
            .filter(|a| !affected.contains(&a.task_id))
            .map(|a| (a.task_id.clone(), a.start_hour))
            .collect();

        let stages = schedule_tree(&tree, &spec, &self.options, pinned_start_hours, cancel)?;
        let result = assemble(&spec, tree, stages, prior.version + 1);
        info!(
            result_id = %result.id,
            version = result.version,
            "recomposition complete"
        );
        Ok(result)
    }
}

/// All task ids reachable forward or backward from any task touched by the
/// change-set, plus tasks whose resource pool was altered
pub fn affected_tasks(prior: &DecompositionResult, changes: &ChangeSet) -> BTreeSet<String> {
    let touched_requirements: BTreeSet<&str> = changes
        .requirements
        .iter()
        .map(|c| c.requirement_id())
        .collect();
    let touched_resources: BTreeSet<&str> = changes
        .resources
        .iter()
        .map(|c| c.resource_type())
        .collect();

    let seeds: Vec<&Task> = prior
        .tree
        .tasks
        .values()
        .filter(|task| {
            touched_requirements.contains(task.requirement_id.as_str())
                || task
                    .resource_requirements
                    .iter()
                    .any(|r| touched_resources.contains(r.resource_type.as_str()))
        })
        .collect();

    // Undirected reachability over the prior dependency graph: a change
    // ripples to everything downstream and invalidates slack upstream.
    let mut neighbors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in &prior.graph.edges {
        neighbors
            .entry(edge.depends_on.as_str())
            .or_default()
            .push(edge.task_id.as_str());
        neighbors
            .entry(edge.task_id.as_str())
            .or_default()
            .push(edge.depends_on.as_str());
    }

    let mut affected: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<&str> = seeds.iter().map(|t| t.id.as_str()).collect();
    while let Some(current) = stack.pop() {
        if !affected.insert(current.to_string()) {
            continue;
        }
        if let Some(next) = neighbors.get(current) {
            for neighbor in next {
                if !affected.contains(*neighbor) {
                    stack.push(neighbor);
                }
            }
        }
    }
    affected
}

/// Applies a change-set to a specification, rejecting edits that do not
/// line up with the current requirements or resources
fn apply_changes(
    spec: &ProjectSpecification,
    changes: &ChangeSet,
) -> Result<ProjectSpecification> {
    let mut spec = spec.clone();

    for change in &changes.requirements {
        match change {
            RequirementChange::Added(requirement) => {
                if spec.requirements.iter().any(|r| r.id == requirement.id) {
                    return Err(ValidationError::DuplicateRequirement(requirement.id.clone()).into());
                }
                spec.requirements.push(requirement.clone());
            }
            RequirementChange::Modified(requirement) => {
                let position = spec
                    .requirements
                    .iter()
                    .position(|r| r.id == requirement.id)
                    .ok_or_else(|| ValidationError::InvalidRequirement {
                        requirement: requirement.id.clone(),
                        detail: "modified requirement does not exist".to_string(),
                    })?;
                spec.requirements[position] = requirement.clone();
            }
            RequirementChange::Removed { id } => {
                let position = spec
                    .requirements
                    .iter()
                    .position(|r| &r.id == id)
                    .ok_or_else(|| ValidationError::InvalidRequirement {
                        requirement: id.clone(),
                        detail: "removed requirement does not exist".to_string(),
                    })?;
                spec.requirements.remove(position);
            }
        }
    }

    for change in &changes.resources {
        match change {
            ResourceChange::Added(resource) => {
                if spec
                    .resources
                    .iter()
                    .any(|r| r.resource_type == resource.resource_type)
                {
                    return Err(
                        ValidationError::DuplicateResource(resource.resource_type.clone()).into(),
                    );
                }
                spec.resources.push(resource.clone());
            }
            ResourceChange::Modified(resource) => {
                let position = spec
                    .resources
                    .iter()
                    .position(|r| r.resource_type == resource.resource_type)
                    .ok_or_else(|| ValidationError::InvalidResource {
                        resource: resource.resource_type.clone(),
                        detail: "modified resource does not exist".to_string(),
                    })?;
                spec.resources[position] = resource.clone();
            }
            ResourceChange::Removed { resource_type } => {
                let position = spec
                    .resources
                    .iter()
                    .position(|r| &r.resource_type == resource_type)
                    .ok_or_else(|| ValidationError::InvalidResource {
                        resource: resource_type.clone(),
                        detail: "removed resource does not exist".to_string(),
                    })?;
                spec.resources.remove(position);
            }
        }
    }

    Ok(spec)
}

/// Carries unaffected prior tasks into the fresh tree by value.
///
/// A prior task is reused when its requirement is outside the affected set
/// and the fresh decomposition reproduced the same content (everything but
/// lifecycle status). Reuse preserves the prior status and content hash.
fn merge_with_sharing(
    prior: &TaskTree,
    fresh: TaskTree,
    affected_requirements: &BTreeSet<String>,
) -> TaskTree {
    let mut merged = TaskTree::new();
    merged.roots = fresh.roots.clone();

    for (id, fresh_task) in fresh.tasks {
        let reusable = if affected_requirements.contains(&fresh_task.requirement_id) {
            None
        } else {
            prior.get(&id).filter(|prior_task| {
                let mut normalized = (*prior_task).clone();
                normalized.status = fresh_task.status;
                normalized == fresh_task
            })
        };
        match reusable {
            Some(prior_task) => merged.insert(prior_task.clone()),
            None => merged.insert(fresh_task),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Planner;
    use planforge_domain::{
        Domain, PlanningConstraints, Priority, Requirement, ResourceSpecification, RiskLevel,
        TaskStatus,
    };

    fn create_test_requirement(id: &str, domain: Domain, hours: f64) -> Requirement {
        Requirement {
            id: id.to_string(),
            name: format!("Requirement {}", id),
            description: String::new(),
            domain,
            priority: Priority::Medium,
            estimated_hours: Some(hours),
            depends_on: Vec::new(),
            risk: RiskLevel::Low,
            business_value: 50.0,
        }
    }

    fn create_test_spec() -> ProjectSpecification {
        ProjectSpecification {
            id: "spec-1".to_string(),
            requirements: vec![
                create_test_requirement("REQ-1", Domain::Backend, 8.0),
                create_test_requirement("REQ-2", Domain::Frontend, 6.0),
            ],
            resources: vec![
                ResourceSpecification::uniform("backend", 2.0),
                ResourceSpecification::uniform("frontend", 2.0),
            ],
            objective: Default::default(),
            constraints: PlanningConstraints::default(),
        }
    }

    fn plan_prior() -> DecompositionResult {
        Planner::default().plan(&create_test_spec()).expect("plan")
    }

    #[test]
    fn test_empty_changeset_only_bumps_version() {
        let prior = plan_prior();
        let next = ChangeImpactEngine::default()
            .recompose(&prior, &ChangeSet::default())
            .expect("recompose");

        assert_eq!(next.version, prior.version + 1);
        assert_ne!(next.id, prior.id);
        assert_eq!(next.spec, prior.spec);
        assert_eq!(next.spec_hash, prior.spec_hash);
        assert_eq!(next.tree, prior.tree);
        assert_eq!(next.graph, prior.graph);
        assert_eq!(next.critical_path, prior.critical_path);
        assert_eq!(next.resource_plan, prior.resource_plan);
        assert_eq!(next.prioritized_order, prior.prioritized_order);
        assert_eq!(next.metrics, prior.metrics);
        assert_eq!(next.recommendations, prior.recommendations);
    }

    #[test]
    fn test_unaffected_task_is_shared_with_status() {
        let mut prior = plan_prior();
        // REQ-2 is already underway when REQ-1 changes.
        if let Some(task) = prior.tree.tasks.get_mut("REQ-2") {
            task.status = TaskStatus::Ready;
        }

        let changes = ChangeSet {
            requirements: vec![RequirementChange::Modified(create_test_requirement(
                "REQ-1",
                Domain::Backend,
                16.0,
            ))],
            resources: Vec::new(),
        };
        let next = ChangeImpactEngine::default()
            .recompose(&prior, &changes)
            .expect("recompose");

        let shared = next.tree.get("REQ-2").expect("REQ-2");
        assert_eq!(shared, prior.tree.get("REQ-2").expect("prior REQ-2"));
        assert_eq!(shared.status, TaskStatus::Ready);

        let replanned = next.tree.get("REQ-1").expect("REQ-1");
        assert_eq!(replanned.status, TaskStatus::Pending);
        assert!((replanned.effort.hours - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_resource_change_invalidates_demanding_tasks() {
        let mut prior = plan_prior();
        if let Some(task) = prior.tree.tasks.get_mut("REQ-1") {
            task.status = TaskStatus::Ready;
        }

        let changes = ChangeSet {
            requirements: Vec::new(),
            resources: vec![ResourceChange::Modified(ResourceSpecification::uniform(
                "backend", 1.0,
            ))],
        };
        let next = ChangeImpactEngine::default()
            .recompose(&prior, &changes)
            .expect("recompose");

        // REQ-1 demands the altered pool, so it is replanned from scratch.
        assert_eq!(
            next.tree.get("REQ-1").expect("REQ-1").status,
            TaskStatus::Pending
        );
    }

    #[test]
    fn test_added_and_removed_requirements() {
        let prior = plan_prior();
        let changes = ChangeSet {
            requirements: vec![
                RequirementChange::Removed {
                    id: "REQ-2".to_string(),
                },
                RequirementChange::Added(create_test_requirement("REQ-3", Domain::Backend, 4.0)),
            ],
            resources: Vec::new(),
        };
        let next = ChangeImpactEngine::default()
            .recompose(&prior, &changes)
            .expect("recompose");

        assert!(next.tree.get("REQ-2").is_none());
        assert!(next.tree.get("REQ-3").is_some());
        assert_eq!(next.version, 2);
    }

    #[test]
    fn test_unknown_modification_is_rejected() {
        let prior = plan_prior();
        let changes = ChangeSet {
            requirements: vec![RequirementChange::Modified(create_test_requirement(
                "REQ-404",
                Domain::Backend,
                4.0,
            ))],
            resources: Vec::new(),
        };
        assert!(ChangeImpactEngine::default()
            .recompose(&prior, &changes)
            .is_err());
    }

    #[test]
    fn test_affected_set_follows_edges() {
        let mut spec = create_test_spec();
        spec.requirements[1].domain = Domain::Backend;
        spec.requirements[1].depends_on = vec!["REQ-1".to_string()];
        spec.resources = vec![ResourceSpecification::uniform("backend", 2.0)];
        let prior = Planner::default().plan(&spec).expect("plan");

        let changes = ChangeSet {
            requirements: vec![RequirementChange::Modified(create_test_requirement(
                "REQ-1",
                Domain::Backend,
                12.0,
            ))],
            resources: Vec::new(),
        };
        let affected = affected_tasks(&prior, &changes);
        assert!(affected.contains("REQ-1"));
        // Downstream of the change through the dependency edge.
        assert!(affected.contains("REQ-2"));
    }
}
