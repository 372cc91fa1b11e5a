//! Plan metrics and advisory recommendations

use planforge_domain::{
    CriticalPathResult, PlanMetrics, ProjectSpecification, ResourcePlan, TaskTree,
};

/// Utilization fraction above which a resource is called out as hot
const HOT_RESOURCE_THRESHOLD: f64 = 0.85;
/// Risk score above which a critical task draws a recommendation
const HIGH_RISK_THRESHOLD: f64 = 7.0;

/// Aggregates plan-level metrics from the task tree
pub fn compute_metrics(tree: &TaskTree) -> PlanMetrics {
    let total_effort = tree.total_leaf_effort();
    let weighted_risk: f64 = tree
        .tasks
        .values()
        .filter(|t| t.is_leaf())
        .map(|t| t.risk_score * t.effort.hours)
        .sum();

    PlanMetrics {
        total_tasks: tree.len(),
        max_depth: tree.max_depth(),
        total_effort_hours: total_effort,
        risk_score: if total_effort > 0.0 {
            weighted_risk / total_effort
        } else {
            0.0
        },
    }
}

/// Produces human-readable advisory recommendations.
///
/// Recommendations never change plan semantics; they surface conditions a
/// caller is likely to act on.
pub fn build_recommendations(
    spec: &ProjectSpecification,
    tree: &TaskTree,
    critical_path: &CriticalPathResult,
    plan: &ResourcePlan,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(deadline) = spec.constraints.deadline_hours {
        if critical_path.total_duration_hours > deadline {
            recommendations.push(format!(
                "Critical path of {:.1}h exceeds the {:.1}h deadline; reduce scope or add capacity",
                critical_path.total_duration_hours, deadline
            ));
        }
    }

    if plan.partial {
        recommendations.push(
            "Allocation search stopped at its budget before converging; \
             re-run with a larger budget to improve the plan"
                .to_string(),
        );
    }

    for resource in &spec.resources {
        if let Some(per_bucket) = plan.utilization.get(&resource.resource_type) {
            let peak = per_bucket
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((bucket, used)) = peak {
                if *used >= resource.capacity * HOT_RESOURCE_THRESHOLD {
                    recommendations.push(format!(
                        "Resource '{}' peaks at {:.1} of {:.1} units around bucket {}; \
                         it is the most likely bottleneck",
                        resource.resource_type, used, resource.capacity, bucket
                    ));
                }
            }
        }
    }

    let mut risky: Vec<&str> = tree
        .tasks
        .values()
        .filter(|t| t.is_leaf())
        .filter(|t| t.risk_score >= HIGH_RISK_THRESHOLD && critical_path.is_critical(&t.id))
        .map(|t| t.id.as_str())
        .collect();
    risky.sort_unstable();
    for id in risky {
        recommendations.push(format!(
            "High-risk task '{}' sits on the critical path; consider scheduling a buffer after it",
            id
        ));
    }

    let leaves = tree.tasks.values().filter(|t| t.is_leaf()).count();
    if leaves > 3 {
        let critical_count = tree
            .tasks
            .values()
            .filter(|t| t.is_leaf())
            .filter(|t| critical_path.is_critical(&t.id))
            .count();
        if critical_count * 2 > leaves {
            recommendations.push(format!(
                "{} of {} tasks have zero slack; the plan has little room to absorb delays",
                critical_count, leaves
            ));
        }
    }

    recommendations
}
