//! Constrained resource allocation
//!
//! Seeds a schedule greedily in critical-path order, then refines it with a
//! caller-selectable solver toward the configured objective. Capacity is a
//! hard constraint per resource and time bucket; budget exhaustion degrades
//! to a feasible plan flagged as partial, never to an invalid plan.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use planforge_domain::{
    compare_task_ids, Allocation, CriticalPathResult, Dependency, DependencyKind,
    OptimizationObjective, ResourcePlan, ResourceSpecification, SearchDiagnostics, Task, TaskTree,
};

use crate::error::{Result, SchedulingError};
use crate::graph::DependencyGraph;

const EPSILON: f64 = 1e-9;

/// Search backend used to refine the greedy seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Exhaustive ordering search for small instances, local search otherwise
    #[default]
    Auto,
    /// Enumerate task orderings with pruning; exact for small instances
    Exhaustive,
    /// Seeded swap-neighborhood local search
    LocalSearch,
}

/// Tunables for the allocation search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOptions {
    /// Search backend
    pub solver: SolverKind,
    /// Maximum candidate schedules to evaluate
    pub max_iterations: u64,
    /// Consecutive non-improving iterations after which local search stops
    pub stall_limit: u64,
    /// Seed for the local-search neighborhood; fixed so runs reproduce
    pub seed: u64,
    /// Wall-clock budget for the search
    pub timeout_ms: Option<u64>,
    /// Instance size up to which Auto picks the exhaustive solver
    pub exhaustive_task_limit: usize,
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self {
            solver: SolverKind::Auto,
            max_iterations: 2_000,
            stall_limit: 200,
            seed: 42,
            timeout_ms: None,
            exhaustive_task_limit: 8,
        }
    }
}

/// Everything the allocator needs for one allocation run
pub struct AllocationContext<'a> {
    /// Task tree whose leaves are scheduled
    pub tree: &'a TaskTree,
    /// Available resource pools
    pub resources: &'a [ResourceSpecification],
    /// Dependency graph over the tree's leaves
    pub graph: &'a DependencyGraph,
    /// Pre-allocation critical-path result, used for ordering heuristics
    pub critical_path: &'a CriticalPathResult,
    /// Objective to optimize for
    pub objective: OptimizationObjective,
    /// Hard project deadline, if any
    pub deadline_hours: Option<f64>,
    /// Preferred start hours carried over from a prior plan; honored when
    /// still feasible, otherwise ignored
    pub pinned_start_hours: BTreeMap<String, f64>,
    /// Cooperative cancellation for the search
    pub cancel: Option<&'a CancellationToken>,
}

/// Assigns resources to tasks under per-bucket capacity constraints
#[derive(Debug, Clone, Default)]
pub struct ResourceAllocator {
    options: AllocationOptions,
}

#[derive(Debug, Clone)]
struct Candidate {
    starts: BTreeMap<String, f64>,
    finishes: BTreeMap<String, f64>,
    usage: BTreeMap<String, BTreeMap<u32, f64>>,
    makespan: f64,
}

#[derive(Debug, Clone)]
struct PlacementConflict {
    resource: String,
    bucket: u32,
    detail: String,
}

struct SearchBudget<'a> {
    started: Instant,
    timeout: Option<Duration>,
    cancel: Option<&'a CancellationToken>,
    iterations: u64,
    max_iterations: u64,
}

impl<'a> SearchBudget<'a> {
    fn new(options: &AllocationOptions, cancel: Option<&'a CancellationToken>) -> Self {
        Self {
            started: Instant::now(),
            timeout: options.timeout_ms.map(Duration::from_millis),
            cancel,
            iterations: 0,
            max_iterations: options.max_iterations,
        }
    }

    fn exhausted(&self) -> bool {
        if self.iterations >= self.max_iterations {
            return true;
        }
        if let Some(timeout) = self.timeout {
            if self.started.elapsed() >= timeout {
                return true;
            }
        }
        self.cancel.map(|c| c.is_cancelled()).unwrap_or(false)
    }

    fn tick(&mut self) {
        self.iterations += 1;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl ResourceAllocator {
    /// Creates an allocator with the given options
    pub fn new(options: AllocationOptions) -> Self {
        Self { options }
    }

    /// Computes a resource plan for the leaves of `ctx.tree`.
    ///
    /// Returns `Infeasible` when no ordering satisfies the hard capacity and
    /// deadline constraints. When the search budget runs out first, the best
    /// feasible plan found so far is returned with `partial` set.
    pub fn allocate(&self, ctx: &AllocationContext) -> Result<ResourcePlan> {
        let leaves: Vec<&Task> = ctx
            .tree
            .leaf_ids()
            .iter()
            .filter_map(|id| ctx.tree.get(id))
            .collect();

        self.check_static_feasibility(&leaves, ctx.resources)?;

        if leaves.is_empty() {
            return Ok(ResourcePlan {
                allocations: Vec::new(),
                utilization: BTreeMap::new(),
                objective: ctx.objective,
                quality_score: 1.0,
                partial: false,
                diagnostics: SearchDiagnostics::default(),
            });
        }

        let horizon = self.horizon(&leaves, ctx);
        let seed_order = self.seed_order(&leaves, ctx.critical_path);
        let mut budget = SearchBudget::new(&self.options, ctx.cancel);
        let mut improvements = 0u64;

        budget.tick();
        let seed_outcome = self.decode(&seed_order, ctx, horizon, true);

        let use_exhaustive = match self.options.solver {
            SolverKind::Exhaustive => true,
            SolverKind::LocalSearch => false,
            SolverKind::Auto => leaves.len() <= self.options.exhaustive_task_limit,
        };

        let mut best: Option<(Vec<String>, Candidate, f64)> = None;
        let mut first_conflict: Option<PlacementConflict> = None;
        match seed_outcome {
            Ok(candidate) => {
                let score = self.score(&candidate, ctx);
                best = Some((seed_order.clone(), candidate, score));
            }
            Err(conflict) => first_conflict = Some(conflict),
        }

        let converged = if use_exhaustive {
            self.search_exhaustive(&seed_order, ctx, horizon, &mut budget, &mut best, &mut improvements)
        } else {
            self.search_local(
                &seed_order,
                ctx,
                horizon,
                &mut budget,
                &mut best,
                &mut improvements,
            )
        };

        let (order, candidate, score) = match best {
            Some(found) => found,
            None => {
                let conflict = first_conflict.unwrap_or(PlacementConflict {
                    resource: String::new(),
                    bucket: 0,
                    detail: "no feasible ordering found".to_string(),
                });
                return Err(SchedulingError::Infeasible {
                    resource: conflict.resource,
                    bucket: Some(conflict.bucket),
                    detail: conflict.detail,
                });
            }
        };

        let partial = !converged;
        if partial {
            warn!(
                iterations = budget.iterations,
                "allocation search stopped before converging; returning best feasible plan"
            );
        }
        debug!(
            tasks = order.len(),
            makespan = candidate.makespan,
            quality = score,
            "allocation complete"
        );

        Ok(self.build_plan(
            &candidate,
            ctx,
            score,
            partial,
            SearchDiagnostics {
                iterations: budget.iterations,
                improvements,
                converged,
                elapsed_ms: budget.elapsed_ms(),
            },
        ))
    }

    /// Rejects demands no bucket could ever satisfy
    fn check_static_feasibility(
        &self,
        leaves: &[&Task],
        resources: &[ResourceSpecification],
    ) -> Result<()> {
        for task in leaves {
            for requirement in &task.resource_requirements {
                let resource = resources
                    .iter()
                    .find(|r| r.resource_type == requirement.resource_type)
                    .ok_or_else(|| SchedulingError::Infeasible {
                        resource: requirement.resource_type.clone(),
                        bucket: None,
                        detail: format!(
                            "task '{}' requires resource type '{}' but no such pool exists",
                            task.id, requirement.resource_type
                        ),
                    })?;

                let peak = resource
                    .calendar
                    .capacity
                    .iter()
                    .copied()
                    .chain(std::iter::once(resource.calendar.default_capacity))
                    .fold(0.0_f64, f64::max)
                    .min(resource.capacity);
                if requirement.quantity > peak + EPSILON {
                    return Err(SchedulingError::Infeasible {
                        resource: requirement.resource_type.clone(),
                        bucket: None,
                        detail: format!(
                            "task '{}' requires {} units but at most {} are ever available",
                            task.id, requirement.quantity, peak
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Scheduling horizon: the deadline when set, otherwise wide enough for
    /// a fully serial schedule even past calendar gaps
    fn horizon(&self, leaves: &[&Task], ctx: &AllocationContext) -> f64 {
        if let Some(deadline) = ctx.deadline_hours {
            return deadline;
        }
        let serial: f64 = leaves
            .iter()
            .map(|t| self.effective_duration(t, ctx.resources))
            .sum();
        let calendar_gaps: f64 = ctx
            .resources
            .iter()
            .map(|r| r.calendar.capacity.len() as f64 * r.calendar.bucket_hours)
            .fold(0.0_f64, f64::max);
        serial + ctx.critical_path.total_duration_hours + calendar_gaps + 1.0
    }

    /// Calendar duration of a task: its slowest required resource wins
    fn effective_duration(&self, task: &Task, resources: &[ResourceSpecification]) -> f64 {
        let base = task.duration_hours.max(0.0);
        task.resource_requirements
            .iter()
            .filter_map(|req| {
                resources
                    .iter()
                    .find(|r| r.resource_type == req.resource_type)
                    .map(|r| r.calendar.duration_hours(task.effort.hours))
            })
            .fold(base, f64::max)
    }

    /// Greedy priority order: critical-path tasks first, then ascending
    /// slack, then descending priority, id order as the final tie-break
    fn seed_order(&self, leaves: &[&Task], critical_path: &CriticalPathResult) -> Vec<String> {
        let mut order: Vec<&Task> = leaves.to_vec();
        order.sort_by(|a, b| {
            let critical_a = critical_path.is_critical(&a.id);
            let critical_b = critical_path.is_critical(&b.id);
            critical_b
                .cmp(&critical_a)
                .then_with(|| {
                    let slack_a = critical_path.slack.get(&a.id).copied().unwrap_or(f64::MAX);
                    let slack_b = critical_path.slack.get(&b.id).copied().unwrap_or(f64::MAX);
                    slack_a
                        .partial_cmp(&slack_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    b.priority
                        .weight()
                        .partial_cmp(&a.priority.weight())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| compare_task_ids(&a.id, &b.id))
        });
        order.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Serial schedule generation: places tasks in priority-list order as
    /// soon as dependencies and capacity allow
    fn decode(
        &self,
        order: &[String],
        ctx: &AllocationContext,
        horizon: f64,
        honor_pins: bool,
    ) -> std::result::Result<Candidate, PlacementConflict> {
        let mut candidate = Candidate {
            starts: BTreeMap::new(),
            finishes: BTreeMap::new(),
            usage: BTreeMap::new(),
            makespan: 0.0,
        };
        let mut remaining: Vec<&String> = order.iter().collect();

        while !remaining.is_empty() {
            // First task in priority order whose predecessors are placed.
            let position = remaining.iter().position(|id| {
                ctx.graph
                    .predecessors_of(id)
                    .all(|edge| candidate.starts.contains_key(&edge.depends_on))
            });
            let position = match position {
                Some(p) => p,
                // Unreachable on an acyclic graph; surface it as a conflict
                // rather than looping forever.
                None => {
                    return Err(PlacementConflict {
                        resource: String::new(),
                        bucket: 0,
                        detail: "priority list contains unsatisfiable ordering".to_string(),
                    });
                }
            };
            let id = remaining.remove(position);
            let task = match ctx.tree.get(id) {
                Some(task) => task,
                None => continue,
            };
            let duration = self.effective_duration(task, ctx.resources);

            let mut ready = 0.0_f64;
            for edge in ctx.graph.predecessors_of(id) {
                let pred_start = candidate.starts[&edge.depends_on];
                let pred_finish = candidate.finishes[&edge.depends_on];
                ready = ready.max(start_bound(edge, pred_start, pred_finish, duration));
            }

            let mut start = ready;
            if honor_pins {
                if let Some(&pinned) = ctx.pinned_start_hours.get(id) {
                    if pinned + EPSILON >= ready
                        && pinned + duration <= horizon + EPSILON
                        && self
                            .conflict_at(task, pinned, duration, ctx.resources, &candidate.usage)
                            .is_none()
                    {
                        start = pinned;
                    }
                }
            }

            let (start, finish) = loop {
                if start + duration > horizon + EPSILON {
                    let conflict = self
                        .conflict_at(task, start, duration, ctx.resources, &candidate.usage)
                        .unwrap_or(PlacementConflict {
                            resource: task
                                .resource_requirements
                                .first()
                                .map(|r| r.resource_type.clone())
                                .unwrap_or_default(),
                            bucket: 0,
                            detail: format!(
                                "task '{}' cannot finish before the deadline",
                                task.id
                            ),
                        });
                    return Err(conflict);
                }
                match self.conflict_at(task, start, duration, ctx.resources, &candidate.usage) {
                    None => break (start, start + duration),
                    Some(conflict) => {
                        let resource = ctx
                            .resources
                            .iter()
                            .find(|r| r.resource_type == conflict.resource);
                        let bucket_hours = resource
                            .map(|r| r.calendar.bucket_hours)
                            .unwrap_or(planforge_domain::DEFAULT_BUCKET_HOURS);
                        let next = (conflict.bucket as f64 + 1.0) * bucket_hours;
                        if next <= start + EPSILON {
                            return Err(conflict);
                        }
                        start = next;
                    }
                }
            };

            self.occupy(task, start, finish, ctx.resources, &mut candidate.usage);
            candidate.makespan = candidate.makespan.max(finish);
            candidate.starts.insert(id.clone(), start);
            candidate.finishes.insert(id.clone(), finish);
        }

        Ok(candidate)
    }

    /// First capacity violation of placing `task` at `start`, if any
    fn conflict_at(
        &self,
        task: &Task,
        start: f64,
        duration: f64,
        resources: &[ResourceSpecification],
        usage: &BTreeMap<String, BTreeMap<u32, f64>>,
    ) -> Option<PlacementConflict> {
        for requirement in &task.resource_requirements {
            let resource = resources
                .iter()
                .find(|r| r.resource_type == requirement.resource_type)?;
            let empty = BTreeMap::new();
            let used = usage.get(&requirement.resource_type).unwrap_or(&empty);
            for bucket in bucket_span(&resource.calendar, start, start + duration) {
                let capacity = resource.calendar.available(bucket).min(resource.capacity);
                let occupied = used.get(&bucket).copied().unwrap_or(0.0);
                if occupied + requirement.quantity > capacity + EPSILON {
                    return Some(PlacementConflict {
                        resource: requirement.resource_type.clone(),
                        bucket,
                        detail: format!(
                            "bucket {} of '{}' holds {:.2} of {:.2} units; task '{}' needs {:.2} more",
                            bucket,
                            requirement.resource_type,
                            occupied,
                            capacity,
                            task.id,
                            requirement.quantity
                        ),
                    });
                }
            }
        }
        None
    }

    fn occupy(
        &self,
        task: &Task,
        start: f64,
        finish: f64,
        resources: &[ResourceSpecification],
        usage: &mut BTreeMap<String, BTreeMap<u32, f64>>,
    ) {
        for requirement in &task.resource_requirements {
            if let Some(resource) = resources
                .iter()
                .find(|r| r.resource_type == requirement.resource_type)
            {
                let used = usage.entry(requirement.resource_type.clone()).or_default();
                for bucket in bucket_span(&resource.calendar, start, finish) {
                    *used.entry(bucket).or_insert(0.0) += requirement.quantity;
                }
            }
        }
    }

    /// Normalized objective score; higher is better
    fn score(&self, candidate: &Candidate, ctx: &AllocationContext) -> f64 {
        match ctx.objective {
            OptimizationObjective::MinimizeMakespan => {
                if candidate.makespan <= EPSILON {
                    return 1.0;
                }
                let lower_bound = ctx.critical_path.total_duration_hours.max(EPSILON);
                (lower_bound / candidate.makespan).clamp(0.0, 1.0)
            }
            OptimizationObjective::MaximizeUtilization => {
                let mut ratios = Vec::new();
                for resource in ctx.resources {
                    if let Some(used) = candidate.usage.get(&resource.resource_type) {
                        let last = used.keys().next_back().copied().unwrap_or(0);
                        let busy: f64 = used.values().sum();
                        let available: f64 = (0..=last)
                            .map(|b| resource.calendar.available(b).min(resource.capacity))
                            .sum();
                        if available > EPSILON {
                            ratios.push((busy / available).clamp(0.0, 1.0));
                        }
                    }
                }
                if ratios.is_empty() {
                    1.0
                } else {
                    ratios.iter().sum::<f64>() / ratios.len() as f64
                }
            }
            OptimizationObjective::MinimizeCost => {
                let mut ideal = 0.0_f64;
                let mut actual = 0.0_f64;
                for resource in ctx.resources {
                    if let Some(used) = candidate.usage.get(&resource.resource_type) {
                        let first = used.keys().next().copied().unwrap_or(0);
                        let last = used.keys().next_back().copied().unwrap_or(0);
                        let busy: f64 = used.values().sum();
                        ideal += resource.cost_per_hour * busy * resource.calendar.bucket_hours;
                        // The pool is held from its first use to its last.
                        let held = (last - first + 1) as f64
                            * resource.calendar.bucket_hours
                            * resource.capacity;
                        actual += resource.cost_per_hour * held;
                    }
                }
                if actual <= EPSILON {
                    1.0
                } else {
                    (ideal / actual).clamp(0.0, 1.0)
                }
            }
        }
    }

    /// Bounded enumeration of task orderings; exact when it completes
    fn search_exhaustive(
        &self,
        seed_order: &[String],
        ctx: &AllocationContext,
        horizon: f64,
        budget: &mut SearchBudget,
        best: &mut Option<(Vec<String>, Candidate, f64)>,
        improvements: &mut u64,
    ) -> bool {
        let mut order = seed_order.to_vec();
        let mut completed = true;
        permute(&mut order, 0, &mut |permutation| {
            if budget.exhausted() {
                completed = false;
                return false;
            }
            budget.tick();
            if let Ok(candidate) = self.decode(permutation, ctx, horizon, false) {
                let score = self.score(&candidate, ctx);
                let improved = best
                    .as_ref()
                    .map(|(_, _, best_score)| score > best_score + EPSILON)
                    .unwrap_or(true);
                if improved {
                    *improvements += 1;
                    *best = Some((permutation.to_vec(), candidate, score));
                }
            }
            true
        });
        completed
    }

    /// Seeded swap-neighborhood local search
    fn search_local(
        &self,
        seed_order: &[String],
        ctx: &AllocationContext,
        horizon: f64,
        budget: &mut SearchBudget,
        best: &mut Option<(Vec<String>, Candidate, f64)>,
        improvements: &mut u64,
    ) -> bool {
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut current = match best {
            Some((order, _, _)) => order.clone(),
            None => seed_order.to_vec(),
        };
        if current.len() < 2 {
            return true;
        }

        let mut stall = 0u64;
        while !budget.exhausted() {
            if stall >= self.options.stall_limit {
                return true;
            }
            budget.tick();

            let i = rng.gen_range(0..current.len());
            let j = rng.gen_range(0..current.len());
            if i == j {
                stall += 1;
                continue;
            }
            current.swap(i, j);

            match self.decode(&current, ctx, horizon, false) {
                Ok(candidate) => {
                    let score = self.score(&candidate, ctx);
                    let improved = best
                        .as_ref()
                        .map(|(_, _, best_score)| score > best_score + EPSILON)
                        .unwrap_or(true);
                    if improved {
                        *improvements += 1;
                        *best = Some((current.clone(), candidate, score));
                        stall = 0;
                    } else {
                        current.swap(i, j);
                        stall += 1;
                    }
                }
                Err(_) => {
                    current.swap(i, j);
                    stall += 1;
                }
            }
        }
        // Budget ran out; converged only if nothing was left to try.
        false
    }

    fn build_plan(
        &self,
        candidate: &Candidate,
        ctx: &AllocationContext,
        quality_score: f64,
        partial: bool,
        diagnostics: SearchDiagnostics,
    ) -> ResourcePlan {
        let mut allocations = Vec::new();
        for (task_id, start) in &candidate.starts {
            let finish = candidate.finishes[task_id];
            let task = match ctx.tree.get(task_id) {
                Some(task) => task,
                None => continue,
            };
            for requirement in &task.resource_requirements {
                if let Some(resource) = ctx
                    .resources
                    .iter()
                    .find(|r| r.resource_type == requirement.resource_type)
                {
                    let buckets = bucket_span(&resource.calendar, *start, finish);
                    allocations.push(Allocation {
                        task_id: task_id.clone(),
                        resource_type: requirement.resource_type.clone(),
                        quantity: requirement.quantity,
                        start_bucket: buckets.start,
                        end_bucket: buckets.end.saturating_sub(1),
                        start_hour: *start,
                        finish_hour: finish,
                    });
                }
            }
        }

        let mut utilization = BTreeMap::new();
        for (resource_type, used) in &candidate.usage {
            let last = used.keys().next_back().copied().unwrap_or(0);
            let mut per_bucket = vec![0.0; (last + 1) as usize];
            for (bucket, quantity) in used {
                per_bucket[*bucket as usize] = *quantity;
            }
            utilization.insert(resource_type.clone(), per_bucket);
        }

        ResourcePlan {
            allocations,
            utilization,
            objective: ctx.objective,
            quality_score,
            partial,
            diagnostics,
        }
    }
}

/// Buckets of `calendar` overlapped by the half-open interval `[start, finish)`
fn bucket_span(
    calendar: &planforge_domain::AvailabilityCalendar,
    start: f64,
    finish: f64,
) -> std::ops::Range<u32> {
    if finish <= start + EPSILON {
        return 0..0;
    }
    let first = (start / calendar.bucket_hours + EPSILON).floor() as u32;
    let last = ((finish / calendar.bucket_hours) - EPSILON).ceil() as u32;
    first..last.max(first + 1)
}

/// Earliest start a scheduled predecessor permits for its dependent
fn start_bound(edge: &Dependency, pred_start: f64, pred_finish: f64, duration: f64) -> f64 {
    let bound = match edge.kind {
        DependencyKind::FinishToStart | DependencyKind::ResourceConstraint => {
            pred_finish + edge.lag_hours
        }
        DependencyKind::StartToStart => pred_start + edge.lag_hours,
        DependencyKind::FinishToFinish => pred_finish + edge.lag_hours - duration,
        DependencyKind::StartToFinish => pred_start + edge.lag_hours - duration,
    };
    bound.max(0.0)
}

/// Heap's algorithm over `order[at..]`; the visitor returns false to stop
fn permute(order: &mut Vec<String>, at: usize, visit: &mut impl FnMut(&[String]) -> bool) -> bool {
    if at == order.len() {
        return visit(order);
    }
    for i in at..order.len() {
        order.swap(at, i);
        let keep_going = permute(order, at + 1, visit);
        order.swap(at, i);
        if !keep_going {
            return false;
        }
    }
    true
}
