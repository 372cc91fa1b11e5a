//! Critical-path (CPM) analysis over a dependency graph

use std::collections::BTreeMap;

use tracing::debug;

use planforge_domain::{
    compare_task_ids, CriticalPathResult, Dependency, DependencyKind, TaskSchedule,
};

use crate::error::Result;
use crate::graph::DependencyGraph;

/// Tolerance for treating floating-point slack as zero
const SLACK_EPSILON: f64 = 1e-9;

/// Computes earliest/latest schedules, slack and every critical path.
///
/// The graph must be acyclic (verified by the builder). Disconnected
/// components are handled by treating every source as anchored at a virtual
/// START (time zero) and every sink as bounded by a virtual END at the total
/// project duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalPathAnalyzer;

impl CriticalPathAnalyzer {
    /// Creates a new analyzer
    pub fn new() -> Self {
        Self
    }

    /// Runs forward and backward passes over `graph`.
    ///
    /// `durations` maps every node to its calendar duration in hours; nodes
    /// missing from the map default to zero duration.
    pub fn analyze(
        &self,
        graph: &DependencyGraph,
        durations: &BTreeMap<String, f64>,
    ) -> Result<CriticalPathResult> {
        let order = graph.topological_sort()?;
        if order.is_empty() {
            return Ok(CriticalPathResult::default());
        }

        let duration_of =
            |id: &str| -> f64 { durations.get(id).copied().unwrap_or(0.0).max(0.0) };

        // Forward pass: earliest times respecting dependency-type semantics.
        let mut earliest_start: BTreeMap<String, f64> = BTreeMap::new();
        for id in &order {
            let duration = duration_of(id);
            let mut start: f64 = 0.0;
            for edge in graph.predecessors_of(id) {
                let pred_start = earliest_start.get(&edge.depends_on).copied().unwrap_or(0.0);
                let pred_finish = pred_start + duration_of(&edge.depends_on);
                let bound = forward_bound(edge, pred_start, pred_finish, duration);
                start = start.max(bound);
            }
            earliest_start.insert(id.clone(), start);
        }

        let total_duration = order
            .iter()
            .map(|id| earliest_start[id] + duration_of(id))
            .fold(0.0_f64, f64::max);

        // Backward pass: latest times from the virtual END node.
        let mut latest_finish: BTreeMap<String, f64> = order
            .iter()
            .map(|id| (id.clone(), total_duration))
            .collect();
        for id in order.iter().rev() {
            let duration = duration_of(id);
            let mut finish = latest_finish[id];
            for edge in graph.successors_of(id) {
                let succ_finish = latest_finish[&edge.task_id];
                let succ_start = succ_finish - duration_of(&edge.task_id);
                finish = finish.min(backward_bound(edge, succ_start, succ_finish, duration));
            }
            latest_finish.insert(id.clone(), finish);
        }

        let mut schedule = BTreeMap::new();
        let mut slack = BTreeMap::new();
        for id in &order {
            let duration = duration_of(id);
            let es = earliest_start[id];
            let lf = latest_finish[id];
            let window = TaskSchedule {
                earliest_start: es,
                earliest_finish: es + duration,
                latest_start: lf - duration,
                latest_finish: lf,
            };
            slack.insert(id.clone(), window.slack());
            schedule.insert(id.clone(), window);
        }

        let paths = enumerate_critical_paths(graph, &order, &schedule, &slack);
        debug!(
            total_duration,
            critical_paths = paths.len(),
            "critical path analysis complete"
        );

        Ok(CriticalPathResult {
            paths,
            total_duration_hours: total_duration,
            slack,
            schedule,
        })
    }
}

/// Lower bound a predecessor edge imposes on the successor's earliest start
fn forward_bound(edge: &Dependency, pred_start: f64, pred_finish: f64, duration: f64) -> f64 {
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

/// Upper bound a successor edge imposes on the predecessor's latest finish
fn backward_bound(edge: &Dependency, succ_start: f64, succ_finish: f64, duration: f64) -> f64 {
    match edge.kind {
        DependencyKind::FinishToStart | DependencyKind::ResourceConstraint => {
            succ_start - edge.lag_hours
        }
        DependencyKind::StartToStart => succ_start - edge.lag_hours + duration,
        DependencyKind::FinishToFinish => succ_finish - edge.lag_hours,
        DependencyKind::StartToFinish => succ_finish - edge.lag_hours + duration,
    }
}

/// Whether the forward constraint of `edge` is binding on the successor
fn edge_is_binding(
    edge: &Dependency,
    schedule: &BTreeMap<String, TaskSchedule>,
) -> bool {
    let pred = &schedule[&edge.depends_on];
    let succ = &schedule[&edge.task_id];
    let duration = succ.earliest_finish - succ.earliest_start;
    let bound = forward_bound(edge, pred.earliest_start, pred.earliest_finish, duration);
    (bound - succ.earliest_start).abs() < SLACK_EPSILON
}

/// Enumerates every path of zero-slack tasks connected by binding edges.
///
/// Ties are never collapsed: parallel zero-slack branches each produce their
/// own path. Paths and their steps come out in deterministic id order.
fn enumerate_critical_paths(
    graph: &DependencyGraph,
    order: &[String],
    schedule: &BTreeMap<String, TaskSchedule>,
    slack: &BTreeMap<String, f64>,
) -> Vec<Vec<String>> {
    let is_critical = |id: &str| slack.get(id).map(|s| s.abs() < SLACK_EPSILON).unwrap_or(false);

    let critical_successors = |id: &str| -> Vec<String> {
        let mut next: Vec<String> = graph
            .successors_of(id)
            .filter(|edge| is_critical(&edge.task_id) && edge_is_binding(edge, schedule))
            .map(|edge| edge.task_id.clone())
            .collect();
        next.sort_by(|a, b| compare_task_ids(a, b));
        next.dedup();
        next
    };

    // Path heads: critical tasks no binding critical edge leads into.
    let mut heads: Vec<String> = order
        .iter()
        .filter(|id| is_critical(id))
        .filter(|id| {
            !graph
                .predecessors_of(id)
                .any(|edge| is_critical(&edge.depends_on) && edge_is_binding(edge, schedule))
        })
        .cloned()
        .collect();
    heads.sort_by(|a, b| compare_task_ids(a, b));

    let mut paths = Vec::new();
    for head in heads {
        let mut prefix = vec![head];
        extend_paths(&mut paths, &mut prefix, &critical_successors);
    }
    paths
}

fn extend_paths(
    paths: &mut Vec<Vec<String>>,
    prefix: &mut Vec<String>,
    critical_successors: &impl Fn(&str) -> Vec<String>,
) {
    let last = match prefix.last() {
        Some(last) => last.clone(),
        None => return,
    };
    let next = critical_successors(&last);
    if next.is_empty() {
        paths.push(prefix.clone());
        return;
    }
    for successor in next {
        prefix.push(successor);
        extend_paths(paths, prefix, critical_successors);
        prefix.pop();
    }
}
