//! Recursive requirement decomposition

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use planforge_domain::{
    compare_task_ids, Dependency, Domain, EffortEstimate, ProjectSpecification, Requirement,
    ResourceRequirement, SkillLevel, Task, TaskKind, TaskStatus, TaskTree,
};

use crate::complexity::{ComplexityAnalyzer, SplitUnit};
use crate::error::{DecompositionError, Result};
use crate::strategies::{strategy_for, PhaseTemplate};

/// Tunables for the decomposer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionOptions {
    /// Maximum split depth below a requirement root
    pub max_depth: usize,
    /// Maximum number of tasks produced at any one level of a subtree
    pub max_tasks_per_level: usize,
    /// Units scoring above this complexity (0-10) are split further
    pub min_complexity_threshold: f64,
    /// Effort assigned to a requirement with no estimate and no estimated
    /// siblings in its domain group
    pub default_effort_hours: f64,
    /// Decompose disjoint domain groups on worker threads
    pub parallel: bool,
}

impl Default for DecompositionOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_tasks_per_level: 12,
            min_complexity_threshold: 5.0,
            default_effort_hours: 8.0,
            parallel: true,
        }
    }
}

/// Confidence assigned to efforts taken from an explicit estimate
const ESTIMATED_CONFIDENCE: f64 = 0.8;
/// Confidence assigned to efforts filled in by the sibling-median heuristic
const DEFAULTED_CONFIDENCE: f64 = 0.4;
/// Confidence gained per split level as work becomes better understood
const CONFIDENCE_GAIN_PER_SPLIT: f64 = 0.15;

/// Splits requirements into a hierarchical task tree using per-domain
/// strategies, guided by [`ComplexityAnalyzer`] scores.
#[derive(Debug, Clone, Default)]
pub struct Decomposer {
    options: DecompositionOptions,
    analyzer: ComplexityAnalyzer,
}

#[derive(Debug, Clone)]
struct ResolvedRequirement {
    requirement: Requirement,
    effort_hours: f64,
    confidence: f64,
}

#[derive(Debug, Clone)]
struct UnitNode {
    unit: SplitUnit,
    depth: usize,
    parent: Option<String>,
    children: Vec<String>,
    phase: Option<PhaseTemplate>,
}

impl Decomposer {
    /// Creates a decomposer with the given options
    pub fn new(options: DecompositionOptions) -> Self {
        Self {
            options,
            analyzer: ComplexityAnalyzer::new(),
        }
    }

    /// Decomposes a specification into a task tree.
    ///
    /// Requirements are grouped by domain in order of first appearance;
    /// disjoint groups decompose independently (in parallel when enabled)
    /// and merge back in specification order, never completion order.
    /// Calling this twice with an identical specification yields an
    /// identical tree.
    pub fn decompose(&self, spec: &ProjectSpecification) -> Result<TaskTree> {
        let groups = group_by_domain(&spec.requirements);
        debug!(
            groups = groups.len(),
            requirements = spec.requirements.len(),
            "decomposing specification"
        );

        let subtrees: Vec<Result<Vec<Vec<Task>>>> = if self.options.parallel && groups.len() > 1 {
            groups
                .par_iter()
                .map(|(domain, reqs)| self.build_group(*domain, reqs))
                .collect()
        } else {
            groups
                .iter()
                .map(|(domain, reqs)| self.build_group(*domain, reqs))
                .collect()
        };

        let mut tree = TaskTree::new();
        for group_result in subtrees {
            for requirement_tasks in group_result? {
                for task in requirement_tasks {
                    if task.parent.is_none() {
                        tree.roots.push(task.id.clone());
                    }
                    tree.insert(task);
                }
            }
        }

        verify_containment(&tree)?;
        info!(tasks = tree.len(), roots = tree.roots.len(), "decomposition complete");
        Ok(tree)
    }

    fn build_group(&self, domain: Domain, requirements: &[Requirement]) -> Result<Vec<Vec<Task>>> {
        let resolved = resolve_efforts(requirements, self.options.default_effort_hours);
        resolved
            .iter()
            .map(|req| self.build_requirement(domain, req))
            .collect()
    }

    fn build_requirement(&self, domain: Domain, resolved: &ResolvedRequirement) -> Result<Vec<Task>> {
        let requirement = &resolved.requirement;
        if requirement.depends_on.iter().any(|d| d == &requirement.id) {
            return Err(DecompositionError::ContainmentConflict {
                unit: requirement.id.clone(),
                detail: "requirement depends on itself; its tasks would depend on their own ancestor"
                    .to_string(),
            });
        }
        if !resolved.effort_hours.is_finite() || resolved.effort_hours <= 0.0 {
            return Err(DecompositionError::InvalidUnit {
                unit: requirement.id.clone(),
                detail: format!("resolved effort must be positive, got {}", resolved.effort_hours),
            });
        }

        let strategy = strategy_for(domain);
        let root = UnitNode {
            unit: SplitUnit {
                id: requirement.id.clone(),
                name: requirement.name.clone(),
                effort_hours: resolved.effort_hours,
                confidence: resolved.confidence,
                risk: requirement.risk,
                fan_in: requirement.depends_on.len(),
            },
            depth: 0,
            parent: None,
            children: Vec::new(),
            phase: None,
        };

        let mut nodes = vec![root];
        let mut current_level = vec![0usize];
        let mut depth = 0usize;

        while !current_level.is_empty() {
            // Split order: descending effort, then id order.
            current_level.sort_by(|&a, &b| {
                nodes[b]
                    .unit
                    .effort_hours
                    .partial_cmp(&nodes[a].unit.effort_hours)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| compare_task_ids(&nodes[a].unit.id, &nodes[b].unit.id))
            });

            let mut next_level = Vec::new();
            let mut level_child_count = 0usize;

            for index in current_level {
                let complexity = self.analyzer.score(&nodes[index].unit);
                let splits = complexity > self.options.min_complexity_threshold
                    && depth < self.options.max_depth
                    && level_child_count + strategy.phases.len() <= self.options.max_tasks_per_level;
                if !splits {
                    continue;
                }

                let parent_id = nodes[index].unit.id.clone();
                let parent_name = nodes[index].unit.name.clone();
                let parent_effort = nodes[index].unit.effort_hours;
                let parent_confidence = nodes[index].unit.confidence;
                let risk = nodes[index].unit.risk;

                for (position, phase) in strategy.phases.iter().enumerate() {
                    let child = UnitNode {
                        unit: SplitUnit {
                            id: format!("{}.{}", parent_id, position + 1),
                            name: format!("{} - {}", parent_name, phase.name),
                            effort_hours: parent_effort * phase.fraction,
                            confidence: (parent_confidence + CONFIDENCE_GAIN_PER_SPLIT).min(1.0),
                            risk,
                            fan_in: 0,
                        },
                        depth: depth + 1,
                        parent: Some(parent_id.clone()),
                        children: Vec::new(),
                        phase: Some(*phase),
                    };
                    let child_index = nodes.len();
                    nodes[index].children.push(child.unit.id.clone());
                    nodes.push(child);
                    next_level.push(child_index);
                }
                level_child_count += strategy.phases.len();
            }

            current_level = next_level;
            depth += 1;
        }

        Ok(self.materialize(requirement, strategy.default_resource, nodes))
    }

    fn materialize(
        &self,
        requirement: &Requirement,
        default_resource: &str,
        nodes: Vec<UnitNode>,
    ) -> Vec<Task> {
        // Sibling phases execute in declared order as a finish-to-start chain.
        let mut tasks = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let complexity = self.analyzer.score(&node.unit);
            let is_leaf = node.children.is_empty();

            let kind = match (is_leaf, node.depth) {
                (false, 0) => TaskKind::Epic,
                (false, _) => TaskKind::Feature,
                (true, 0) | (true, 1) => TaskKind::Task,
                (true, _) => TaskKind::Subtask,
            };

            let resource_requirements = if is_leaf {
                let (resource_type, skill_level) = match &node.phase {
                    Some(phase) => (phase.resource_type.to_string(), phase.skill),
                    None => (default_resource.to_string(), SkillLevel::Mid),
                };
                vec![ResourceRequirement {
                    resource_type,
                    quantity: 1.0,
                    skill_level,
                }]
            } else {
                Vec::new()
            };

            let dependencies = previous_sibling(&nodes, node)
                .map(|prev| vec![Dependency::finish_to_start(node.unit.id.clone(), prev)])
                .unwrap_or_default();

            tasks.push(Task {
                id: node.unit.id.clone(),
                requirement_id: requirement.id.clone(),
                name: node.unit.name.clone(),
                parent: node.parent.clone(),
                children: node.children.clone(),
                kind,
                effort: EffortEstimate {
                    hours: node.unit.effort_hours,
                    confidence: node.unit.confidence,
                },
                duration_hours: node.unit.effort_hours,
                resource_requirements,
                dependencies,
                priority: requirement.priority,
                status: TaskStatus::Pending,
                business_value: requirement.business_value,
                risk_score: (requirement.risk.score() + complexity * 0.2).min(10.0),
            });
        }
        tasks
    }
}

fn previous_sibling(nodes: &[UnitNode], node: &UnitNode) -> Option<String> {
    let parent_id = node.parent.as_ref()?;
    let parent = nodes.iter().find(|n| &n.unit.id == parent_id)?;
    let position = parent.children.iter().position(|c| c == &node.unit.id)?;
    if position == 0 {
        None
    } else {
        Some(parent.children[position - 1].clone())
    }
}

/// Groups requirements by domain, preserving order of first appearance
fn group_by_domain(requirements: &[Requirement]) -> Vec<(Domain, Vec<Requirement>)> {
    let mut order: Vec<Domain> = Vec::new();
    for requirement in requirements {
        if !order.contains(&requirement.domain) {
            order.push(requirement.domain);
        }
    }
    order
        .into_iter()
        .map(|domain| {
            let members = requirements
                .iter()
                .filter(|r| r.domain == domain)
                .cloned()
                .collect();
            (domain, members)
        })
        .collect()
}

/// Fills in missing effort estimates.
///
/// A requirement without an estimate receives the median of its siblings'
/// estimates within the same domain group, falling back to the configured
/// default when no sibling carries one. Defaults are never silently zero.
fn resolve_efforts(requirements: &[Requirement], default_effort: f64) -> Vec<ResolvedRequirement> {
    let mut known: Vec<f64> = requirements
        .iter()
        .filter_map(|r| r.estimated_hours)
        .collect();
    known.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median = if known.is_empty() {
        None
    } else if known.len() % 2 == 1 {
        Some(known[known.len() / 2])
    } else {
        Some((known[known.len() / 2 - 1] + known[known.len() / 2]) / 2.0)
    };

    requirements
        .iter()
        .map(|requirement| match requirement.estimated_hours {
            Some(hours) => ResolvedRequirement {
                requirement: requirement.clone(),
                effort_hours: hours,
                confidence: ESTIMATED_CONFIDENCE,
            },
            None => ResolvedRequirement {
                requirement: requirement.clone(),
                effort_hours: median.unwrap_or(default_effort),
                confidence: DEFAULTED_CONFIDENCE,
            },
        })
        .collect()
}

/// Rejects trees whose dependency edges cross hierarchy containment
fn verify_containment(tree: &TaskTree) -> Result<()> {
    for task in tree.tasks.values() {
        for dep in &task.dependencies {
            if tree.is_ancestor(&dep.depends_on, &task.id)
                || tree.is_ancestor(&task.id, &dep.depends_on)
            {
                return Err(DecompositionError::ContainmentConflict {
                    unit: task.id.clone(),
                    detail: format!(
                        "dependency on '{}' crosses the task hierarchy",
                        dep.depends_on
                    ),
                });
            }
        }
    }
    Ok(())
}
