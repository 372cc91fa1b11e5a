//! Explicit, content-hash-keyed plan cache
//!
//! The cache is a plain owned value the caller threads through planning
//! calls. There is intentionally no process-wide cache: concurrent planning
//! requests stay independent unless the caller decides to share one.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use planforge_domain::DecompositionResult;

/// Cache configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanCacheConfig {
    /// Maximum number of cached plans; the oldest entry is evicted first
    pub max_entries: usize,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self { max_entries: 32 }
    }
}

/// Caches planning results keyed by specification content hash
#[derive(Debug, Clone, Default)]
pub struct PlanCache {
    entries: BTreeMap<String, DecompositionResult>,
    insertion_order: VecDeque<String>,
    config: PlanCacheConfig,
    hits: u64,
    misses: u64,
}

impl PlanCache {
    /// Creates an empty cache with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache with the given configuration
    pub fn with_config(config: PlanCacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Looks up a cached plan, counting the hit or miss
    pub fn get(&mut self, key: &str) -> Option<&DecompositionResult> {
        match self.entries.get(key) {
            Some(result) => {
                self.hits += 1;
                debug!(key, "plan cache hit");
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a plan, evicting the oldest entry when full
    pub fn insert(&mut self, key: String, result: DecompositionResult) {
        if self.config.max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.config.max_entries {
                match self.insertion_order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.insertion_order.push_back(key.clone());
        }
        self.entries.insert(key, result);
    }

    /// Number of cached plans
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups that found an entry
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that found nothing
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planforge_domain::{
        CriticalPathResult, GraphSnapshot, OptimizationObjective, PlanMetrics,
        PlanningConstraints, ProjectSpecification, ResourcePlan, SearchDiagnostics, TaskTree,
        SCHEMA_VERSION,
    };
    use uuid::Uuid;

    fn create_test_result(version: u32) -> DecompositionResult {
        DecompositionResult {
            id: Uuid::new_v4(),
            version,
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            spec: ProjectSpecification {
                id: "spec-1".to_string(),
                requirements: Vec::new(),
                resources: Vec::new(),
                objective: OptimizationObjective::MinimizeMakespan,
                constraints: PlanningConstraints::default(),
            },
            spec_hash: format!("hash-{}", version),
            tree: TaskTree::new(),
            graph: GraphSnapshot::default(),
            critical_path: CriticalPathResult::default(),
            resource_plan: ResourcePlan {
                allocations: Vec::new(),
                utilization: Default::default(),
                objective: OptimizationObjective::MinimizeMakespan,
                quality_score: 1.0,
                partial: false,
                diagnostics: SearchDiagnostics::default(),
            },
            prioritized_order: Vec::new(),
            metrics: PlanMetrics::default(),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let mut cache = PlanCache::new();
        assert!(cache.get("absent").is_none());
        cache.insert("key".to_string(), create_test_result(1));
        assert!(cache.get("key").is_some());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let mut cache = PlanCache::with_config(PlanCacheConfig { max_entries: 2 });
        cache.insert("a".to_string(), create_test_result(1));
        cache.insert("b".to_string(), create_test_result(2));
        cache.insert("c".to_string(), create_test_result(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut cache = PlanCache::with_config(PlanCacheConfig { max_entries: 2 });
        cache.insert("a".to_string(), create_test_result(1));
        cache.insert("a".to_string(), create_test_result(2));
        assert_eq!(cache.len(), 1);
    }
}
