//! Deterministic task prioritization

use serde::{Deserialize, Serialize};

use planforge_domain::{compare_task_ids, CriticalPathResult, TaskTree, DEFAULT_BUCKET_HOURS};

/// Weights for the prioritization score
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityWeights {
    /// Weight of normalized business value
    pub business_value: f64,
    /// Boost for critical-path membership
    pub critical_path: f64,
    /// Weight of inverse slack
    pub slack: f64,
    /// Weight of normalized risk
    pub risk: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            business_value: 0.35,
            critical_path: 0.30,
            slack: 0.20,
            risk: 0.15,
        }
    }
}

/// Orders leaf tasks by a weighted blend of business value, criticality,
/// slack and risk.
///
/// The ordering is a pure total order: no randomness, and ties always break
/// toward the lower task id, so identical inputs reproduce identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrioritizationEngine {
    weights: PriorityWeights,
}

impl PrioritizationEngine {
    /// Creates an engine with the given weights
    pub fn new(weights: PriorityWeights) -> Self {
        Self { weights }
    }

    /// Returns leaf task ids in descending priority order
    pub fn prioritize(&self, tree: &TaskTree, critical_path: &CriticalPathResult) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = tree
            .leaf_ids()
            .into_iter()
            .map(|id| {
                let score = self.score(tree, critical_path, &id);
                (id, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| compare_task_ids(&a.0, &b.0))
        });
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Score of a single task; higher schedules earlier
    pub fn score(&self, tree: &TaskTree, critical_path: &CriticalPathResult, id: &str) -> f64 {
        let task = match tree.get(id) {
            Some(task) => task,
            None => return 0.0,
        };

        let business_value = (task.business_value / 100.0).clamp(0.0, 1.0);
        let critical = if critical_path.is_critical(id) { 1.0 } else { 0.0 };
        let slack_hours = critical_path.slack.get(id).copied().unwrap_or(0.0);
        // One bucket of slack halves the urgency contribution.
        let inverse_slack = 1.0 / (1.0 + slack_hours / DEFAULT_BUCKET_HOURS);
        let risk = (task.risk_score / 10.0).clamp(0.0, 1.0);

        self.weights.business_value * business_value
            + self.weights.critical_path * critical
            + self.weights.slack * inverse_slack
            + self.weights.risk * risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planforge_domain::{
        CriticalPathResult, EffortEstimate, Priority, Task, TaskKind, TaskSchedule, TaskStatus,
    };
    use std::collections::BTreeMap;

    fn create_test_task(id: &str, business_value: f64, risk: f64) -> Task {
        Task {
            id: id.to_string(),
            requirement_id: id.to_string(),
            name: format!("Task {}", id),
            parent: None,
            children: Vec::new(),
            kind: TaskKind::Task,
            effort: EffortEstimate {
                hours: 8.0,
                confidence: 0.8,
            },
            duration_hours: 8.0,
            resource_requirements: Vec::new(),
            dependencies: Vec::new(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            business_value,
            risk_score: risk,
        }
    }

    fn create_tree(tasks: Vec<Task>) -> TaskTree {
        let mut tree = TaskTree::new();
        for task in tasks {
            tree.roots.push(task.id.clone());
            tree.insert(task);
        }
        tree
    }

    fn create_critical_result(slacks: &[(&str, f64)]) -> CriticalPathResult {
        let slack: BTreeMap<String, f64> =
            slacks.iter().map(|(id, s)| (id.to_string(), *s)).collect();
        let schedule: BTreeMap<String, TaskSchedule> = slacks
            .iter()
            .map(|(id, s)| {
                (
                    id.to_string(),
                    TaskSchedule {
                        earliest_start: 0.0,
                        earliest_finish: 8.0,
                        latest_start: *s,
                        latest_finish: *s + 8.0,
                    },
                )
            })
            .collect();
        CriticalPathResult {
            paths: Vec::new(),
            total_duration_hours: 8.0,
            slack,
            schedule,
        }
    }

    #[test]
    fn test_critical_tasks_rank_first() {
        let tree = create_tree(vec![
            create_test_task("T1", 50.0, 2.0),
            create_test_task("T2", 50.0, 2.0),
        ]);
        let critical = create_critical_result(&[("T1", 16.0), ("T2", 0.0)]);

        let order = PrioritizationEngine::default().prioritize(&tree, &critical);
        assert_eq!(order, vec!["T2", "T1"]);
    }

    #[test]
    fn test_business_value_breaks_equal_slack() {
        let tree = create_tree(vec![
            create_test_task("T1", 20.0, 2.0),
            create_test_task("T2", 90.0, 2.0),
        ]);
        let critical = create_critical_result(&[("T1", 0.0), ("T2", 0.0)]);

        let order = PrioritizationEngine::default().prioritize(&tree, &critical);
        assert_eq!(order, vec!["T2", "T1"]);
    }

    #[test]
    fn test_equal_scores_tie_break_on_id() {
        let tree = create_tree(vec![
            create_test_task("T2", 50.0, 2.0),
            create_test_task("T1", 50.0, 2.0),
        ]);
        let critical = create_critical_result(&[("T1", 0.0), ("T2", 0.0)]);

        let order = PrioritizationEngine::default().prioritize(&tree, &critical);
        assert_eq!(order, vec!["T1", "T2"]);
    }

    #[test]
    fn test_ordering_is_reproducible() {
        let tree = create_tree(vec![
            create_test_task("T1", 10.0, 8.0),
            create_test_task("T2", 80.0, 1.0),
            create_test_task("T3", 45.0, 5.0),
        ]);
        let critical = create_critical_result(&[("T1", 0.0), ("T2", 4.0), ("T3", 12.0)]);

        let engine = PrioritizationEngine::default();
        assert_eq!(
            engine.prioritize(&tree, &critical),
            engine.prioritize(&tree, &critical)
        );
    }
}
