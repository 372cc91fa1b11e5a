//! Core data models for planning

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Working hours in a standard scheduling bucket (one working day).
pub const DEFAULT_BUCKET_HOURS: f64 = 8.0;

/// Version of the serialized `DecompositionResult` schema.
pub const SCHEMA_VERSION: u32 = 1;

/// Immutable planning input supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpecification {
    /// Unique specification identifier
    pub id: String,
    /// Ordered list of requirements to plan
    pub requirements: Vec<Requirement>,
    /// Resource pools available to the plan
    pub resources: Vec<ResourceSpecification>,
    /// Objective the resource allocator optimizes for
    #[serde(default)]
    pub objective: OptimizationObjective,
    /// Hard planning constraints
    #[serde(default)]
    pub constraints: PlanningConstraints,
}

/// A single requirement within a specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Unique requirement identifier
    pub id: String,
    /// Short requirement name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Engineering domain this requirement belongs to
    pub domain: Domain,
    /// Business priority
    #[serde(default)]
    pub priority: Priority,
    /// Raw effort estimate in working hours, if known
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Ids of requirements this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Delivery risk level
    #[serde(default)]
    pub risk: RiskLevel,
    /// Relative business value (0-100)
    #[serde(default = "default_business_value")]
    pub business_value: f64,
}

fn default_business_value() -> f64 {
    50.0
}

/// Hard constraints applied to the whole plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanningConstraints {
    /// Overall deadline in hours from project start, if any
    #[serde(default)]
    pub deadline_hours: Option<f64>,
}

/// Engineering domain used to select a decomposition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// User-facing interface work
    Frontend,
    /// Server-side service work
    Backend,
    /// Schema, storage and query work
    Database,
    /// Build, deploy and operations work
    Infrastructure,
    /// Test and verification work
    Testing,
    /// Documentation work
    Documentation,
    /// Anything that does not fit a specific domain
    General,
}

/// Business priority of a requirement or task
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric weight used by ordering heuristics
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
            Priority::Critical => 4.0,
        }
    }
}

/// Delivery risk level of a requirement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Base risk score on the 0-10 scale
    pub fn score(&self) -> f64 {
        match self {
            RiskLevel::Low => 2.0,
            RiskLevel::Medium => 5.0,
            RiskLevel::High => 8.0,
        }
    }
}

/// Skill level required from an assigned resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Junior,
    #[default]
    Mid,
    Senior,
}

/// Granularity of a task in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Epic,
    Feature,
    Task,
    Subtask,
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    InProgress,
    Done,
    Blocked,
    Cancelled,
}

/// Effort estimate with confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortEstimate {
    /// Estimated working hours
    pub hours: f64,
    /// Confidence in the estimate (0.0-1.0)
    pub confidence: f64,
}

/// A typed resource demand of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    /// Resource type, e.g. "backend" or "architect"
    pub resource_type: String,
    /// Units of the resource required concurrently
    pub quantity: f64,
    /// Minimum skill level required
    #[serde(default)]
    pub skill_level: SkillLevel,
}

/// Type of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Successor may start once the predecessor finished
    #[default]
    FinishToStart,
    /// Successor may start once the predecessor started
    StartToStart,
    /// Successor may finish once the predecessor finished
    FinishToFinish,
    /// Successor may finish once the predecessor started
    StartToFinish,
    /// Ordering induced by contention on a shared resource
    ResourceConstraint,
}

/// Whether a dependency is binding or advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStrength {
    #[default]
    Hard,
    Soft,
}

/// A directed dependency edge between two tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// The dependent task
    pub task_id: String,
    /// The task it depends on
    pub depends_on: String,
    /// Dependency type
    #[serde(default)]
    pub kind: DependencyKind,
    /// Hard or soft
    #[serde(default)]
    pub strength: DependencyStrength,
    /// Lag in hours applied to the constraint
    #[serde(default)]
    pub lag_hours: f64,
}

impl Dependency {
    /// Creates a hard finish-to-start dependency with no lag
    pub fn finish_to_start(task_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on: depends_on.into(),
            kind: DependencyKind::FinishToStart,
            strength: DependencyStrength::Hard,
            lag_hours: 0.0,
        }
    }
}

/// A unit of work produced by decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier derived from the originating requirement and split path
    pub id: String,
    /// Id of the requirement this task was decomposed from
    pub requirement_id: String,
    /// Human-readable task name
    pub name: String,
    /// Parent task id, if any
    #[serde(default)]
    pub parent: Option<String>,
    /// Child task ids in execution order
    #[serde(default)]
    pub children: Vec<String>,
    /// Granularity of this task
    pub kind: TaskKind,
    /// Effort estimate
    pub effort: EffortEstimate,
    /// Duration in hours under the default calendar
    pub duration_hours: f64,
    /// Typed resource demands
    #[serde(default)]
    pub resource_requirements: Vec<ResourceRequirement>,
    /// Dependency edges where this task is the dependent
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Business priority inherited from the requirement
    #[serde(default)]
    pub priority: Priority,
    /// Lifecycle state
    #[serde(default)]
    pub status: TaskStatus,
    /// Business value score (0-100)
    pub business_value: f64,
    /// Risk score (0-10)
    pub risk_score: f64,
}

impl Task {
    /// Whether this task is a leaf of the hierarchy
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Hierarchical task arena addressed by stable string ids.
///
/// Parent/child links are id references, never live pointers, so versions of
/// a plan can share unchanged tasks by value without ownership cycles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskTree {
    /// All tasks keyed by id; BTreeMap keeps iteration deterministic
    pub tasks: BTreeMap<String, Task>,
    /// Root task ids in specification order
    pub roots: Vec<String>,
}

impl TaskTree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks in the tree
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the tree holds no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Looks up a task by id
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Inserts a task, replacing any previous task with the same id
    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Whether the tree contains the given task id
    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// All leaf task ids in deterministic id order
    pub fn leaf_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.is_leaf())
            .map(|t| t.id.clone())
            .collect();
        ids.sort_by(|a, b| compare_task_ids(a, b));
        ids
    }

    /// Leaf descendants of a task (the task itself if it is a leaf),
    /// in deterministic id order
    pub fn leaf_descendants(&self, id: &str) -> Vec<String> {
        let mut leaves = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(task) = self.tasks.get(&current) {
                if task.is_leaf() {
                    leaves.push(current);
                } else {
                    for child in &task.children {
                        stack.push(child.clone());
                    }
                }
            }
        }
        leaves.sort_by(|a, b| compare_task_ids(a, b));
        leaves
    }

    /// Whether `ancestor` is a strict ancestor of `id` in the hierarchy
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.tasks.get(id).and_then(|t| t.parent.clone());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.tasks.get(&parent).and_then(|t| t.parent.clone());
        }
        false
    }

    /// Depth of a task; roots are depth 0
    pub fn depth_of(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.tasks.get(id).and_then(|t| t.parent.clone());
        while let Some(parent) = current {
            depth += 1;
            current = self.tasks.get(&parent).and_then(|t| t.parent.clone());
        }
        depth
    }

    /// Maximum depth across the tree
    pub fn max_depth(&self) -> usize {
        self.tasks
            .keys()
            .map(|id| self.depth_of(id))
            .max()
            .unwrap_or(0)
    }

    /// Sum of leaf effort hours
    pub fn total_leaf_effort(&self) -> f64 {
        self.tasks
            .values()
            .filter(|t| t.is_leaf())
            .map(|t| t.effort.hours)
            .sum()
    }
}

/// Orders structured task ids (`REQ-1.2.10`) so that split indices compare
/// numerically while requirement stems compare lexicographically.
pub fn compare_task_ids(a: &str, b: &str) -> Ordering {
    let (stem_a, path_a) = split_task_id(a);
    let (stem_b, path_b) = split_task_id(b);
    stem_a.cmp(stem_b).then_with(|| path_a.cmp(&path_b))
}

fn split_task_id(id: &str) -> (&str, Vec<u64>) {
    match id.find('.') {
        Some(pos) => {
            let indices = id[pos + 1..]
                .split('.')
                .map(|seg| seg.parse::<u64>().unwrap_or(u64::MAX))
                .collect();
            (&id[..pos], indices)
        }
        None => (id, Vec::new()),
    }
}

/// Time-bucketed availability of a resource pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCalendar {
    /// Working hours per bucket
    pub bucket_hours: f64,
    /// Explicit per-bucket capacity overrides starting at bucket 0
    #[serde(default)]
    pub capacity: Vec<f64>,
    /// Capacity for buckets past the explicit overrides
    pub default_capacity: f64,
}

impl AvailabilityCalendar {
    /// Uniform calendar with standard buckets and the given capacity
    pub fn uniform(capacity: f64) -> Self {
        Self {
            bucket_hours: DEFAULT_BUCKET_HOURS,
            capacity: Vec::new(),
            default_capacity: capacity,
        }
    }

    /// Capacity available in the given bucket
    pub fn available(&self, bucket: u32) -> f64 {
        self.capacity
            .get(bucket as usize)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    /// Converts working-hour effort into calendar duration in hours.
    ///
    /// A calendar with shorter buckets stretches the same effort over more
    /// elapsed time; the default calendar maps effort 1:1.
    pub fn duration_hours(&self, effort_hours: f64) -> f64 {
        if self.bucket_hours <= 0.0 {
            return effort_hours;
        }
        effort_hours * (DEFAULT_BUCKET_HOURS / self.bucket_hours)
    }
}

/// A typed resource pool with capacity and availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpecification {
    /// Resource type, e.g. "backend" or "architect"
    pub resource_type: String,
    /// Total units of the resource
    pub capacity: f64,
    /// Cost per unit-hour, used by the cost objective
    #[serde(default = "default_cost_per_hour")]
    pub cost_per_hour: f64,
    /// Time-bucketed availability
    pub calendar: AvailabilityCalendar,
}

fn default_cost_per_hour() -> f64 {
    1.0
}

impl ResourceSpecification {
    /// Uniform full-time resource pool of the given capacity
    pub fn uniform(resource_type: impl Into<String>, capacity: f64) -> Self {
        Self {
            resource_type: resource_type.into(),
            capacity,
            cost_per_hour: default_cost_per_hour(),
            calendar: AvailabilityCalendar::uniform(capacity),
        }
    }
}

/// Objective the resource allocator optimizes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationObjective {
    /// Minimize total time to complete all tasks
    #[default]
    MinimizeMakespan,
    /// Maximize average utilization of the resource pools
    MaximizeUtilization,
    /// Minimize the cost of holding resources across their usage span
    MinimizeCost,
}

/// Assignment of a resource to a task over a bucket span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Task receiving the resource
    pub task_id: String,
    /// Resource type assigned
    pub resource_type: String,
    /// Units assigned per bucket
    pub quantity: f64,
    /// First occupied bucket
    pub start_bucket: u32,
    /// Last occupied bucket (inclusive)
    pub end_bucket: u32,
    /// Scheduled start in hours
    pub start_hour: f64,
    /// Scheduled finish in hours
    pub finish_hour: f64,
}

/// Diagnostics for the allocation search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchDiagnostics {
    /// Candidate schedules evaluated
    pub iterations: u64,
    /// Number of strict objective improvements found
    pub improvements: u64,
    /// Whether the search converged before hitting its budget
    pub converged: bool,
    /// Wall-clock time spent searching
    pub elapsed_ms: u64,
}

/// Resource assignment for every scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// Per-task allocations
    pub allocations: Vec<Allocation>,
    /// Per-resource per-bucket assigned quantity
    pub utilization: BTreeMap<String, Vec<f64>>,
    /// Objective this plan was optimized for
    pub objective: OptimizationObjective,
    /// Normalized quality of the plan under the objective (0.0-1.0)
    pub quality_score: f64,
    /// True when the search hit its budget before converging
    #[serde(default)]
    pub partial: bool,
    /// Search diagnostics
    #[serde(default)]
    pub diagnostics: SearchDiagnostics,
}

impl ResourcePlan {
    /// Looks up the allocation for a task
    pub fn allocation_for(&self, task_id: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.task_id == task_id)
    }
}

/// Scheduled window of a single task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskSchedule {
    /// Earliest start in hours
    pub earliest_start: f64,
    /// Earliest finish in hours
    pub earliest_finish: f64,
    /// Latest start in hours
    pub latest_start: f64,
    /// Latest finish in hours
    pub latest_finish: f64,
}

impl TaskSchedule {
    /// Slack available before the task delays the project
    pub fn slack(&self) -> f64 {
        self.latest_start - self.earliest_start
    }
}

/// Output of critical-path analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CriticalPathResult {
    /// Every zero-slack path, in deterministic order
    pub paths: Vec<Vec<String>>,
    /// Total project duration in hours
    pub total_duration_hours: f64,
    /// Per-task slack in hours
    pub slack: BTreeMap<String, f64>,
    /// Per-task schedule windows
    pub schedule: BTreeMap<String, TaskSchedule>,
}

impl CriticalPathResult {
    /// Whether the task lies on a critical path
    pub fn is_critical(&self, task_id: &str) -> bool {
        self.slack
            .get(task_id)
            .map(|s| s.abs() < 1e-9)
            .unwrap_or(false)
    }
}

/// Serializable snapshot of a dependency graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Node task ids in deterministic order
    pub nodes: Vec<String>,
    /// All edges, explicit and inferred
    pub edges: Vec<Dependency>,
}

/// Aggregate plan metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanMetrics {
    /// Total number of tasks, containers included
    pub total_tasks: usize,
    /// Maximum hierarchy depth
    pub max_depth: usize,
    /// Sum of leaf effort hours
    pub total_effort_hours: f64,
    /// Effort-weighted average risk score (0-10)
    pub risk_score: f64,
}

/// Versioned, immutable planning result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    /// Unique result identifier
    pub id: Uuid,
    /// Monotonically increasing plan version
    pub version: u32,
    /// Serialized schema version
    pub schema_version: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Snapshot of the specification this plan was computed from
    pub spec: ProjectSpecification,
    /// Content hash of the specification
    pub spec_hash: String,
    /// Hierarchical task tree
    pub tree: TaskTree,
    /// Dependency graph snapshot
    pub graph: GraphSnapshot,
    /// Critical-path analysis result
    pub critical_path: CriticalPathResult,
    /// Resource allocation plan
    pub resource_plan: ResourcePlan,
    /// Task ids in priority order
    pub prioritized_order: Vec<String>,
    /// Aggregate metrics
    pub metrics: PlanMetrics,
    /// Advisory recommendations
    pub recommendations: Vec<String>,
}

/// A change to a single requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequirementChange {
    /// A new requirement was added
    Added(Requirement),
    /// An existing requirement was modified
    Modified(Requirement),
    /// A requirement was removed
    Removed {
        /// Id of the removed requirement
        id: String,
    },
}

impl RequirementChange {
    /// Id of the requirement this change touches
    pub fn requirement_id(&self) -> &str {
        match self {
            RequirementChange::Added(r) | RequirementChange::Modified(r) => &r.id,
            RequirementChange::Removed { id } => id,
        }
    }
}

/// A change to a resource pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ResourceChange {
    /// A new resource pool was added
    Added(ResourceSpecification),
    /// An existing resource pool was modified
    Modified(ResourceSpecification),
    /// A resource pool was removed
    Removed {
        /// Type of the removed resource
        resource_type: String,
    },
}

impl ResourceChange {
    /// Resource type this change touches
    pub fn resource_type(&self) -> &str {
        match self {
            ResourceChange::Added(r) | ResourceChange::Modified(r) => &r.resource_type,
            ResourceChange::Removed { resource_type } => resource_type,
        }
    }
}

/// A set of requirement and resource edits to re-plan against
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Requirement-level changes
    #[serde(default)]
    pub requirements: Vec<RequirementChange>,
    /// Resource-level changes
    #[serde(default)]
    pub resources: Vec<ResourceChange>,
}

impl ChangeSet {
    /// Whether the change-set contains no edits
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.resources.is_empty()
    }

    /// Ids of requirements touched by this change-set
    pub fn touched_requirements(&self) -> Vec<String> {
        self.requirements
            .iter()
            .map(|c| c.requirement_id().to_string())
            .collect()
    }

    /// Resource types touched by this change-set
    pub fn touched_resources(&self) -> Vec<String> {
        self.resources
            .iter()
            .map(|c| c.resource_type().to_string())
            .collect()
    }
}
