//! Content hashing for cache keys and structural sharing

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{ProjectSpecification, Task};

/// Hex-encoded SHA-256 over the canonical JSON form of a value.
///
/// Struct fields serialize in declaration order and maps used in the domain
/// model are BTreeMaps, so equal values always hash equally.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(value) {
        Ok(bytes) => hasher.update(&bytes),
        // Serialization of domain models is infallible in practice; an empty
        // hash input would still be deterministic for the same value.
        Err(_) => hasher.update([]),
    }
    hex::encode(hasher.finalize())
}

/// Content hash of a full specification, used as the plan cache key
pub fn spec_hash(spec: &ProjectSpecification) -> String {
    content_hash(spec)
}

/// Content hash of a task's semantic fields, used for structural sharing
pub fn task_hash(task: &Task) -> String {
    content_hash(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EffortEstimate, Priority, TaskKind, TaskStatus};

    fn create_test_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            requirement_id: "REQ-1".to_string(),
            name: "Test".to_string(),
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
            business_value: 50.0,
            risk_score: 2.0,
        }
    }

    #[test]
    fn test_equal_tasks_hash_equally() {
        let a = create_test_task("REQ-1.1");
        let b = create_test_task("REQ-1.1");
        assert_eq!(task_hash(&a), task_hash(&b));
    }

    #[test]
    fn test_different_content_hashes_differently() {
        let a = create_test_task("REQ-1.1");
        let mut b = create_test_task("REQ-1.1");
        b.effort.hours = 16.0;
        assert_ne!(task_hash(&a), task_hash(&b));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = task_hash(&create_test_task("REQ-1.1"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
