//! Dependency graph construction and cycle detection

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use planforge_domain::{
    compare_task_ids, Dependency, DependencyKind, DependencyStrength, GraphSnapshot,
    ResourceSpecification, TaskTree,
};

use crate::error::{Result, SchedulingError};

/// Options for graph construction
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Infer soft ordering edges between tasks whose combined demand for a
    /// single resource exceeds its capacity. Opt-in: when unset, resource
    /// contention is left entirely to the allocator.
    #[serde(default)]
    pub infer_resource_ordering: bool,
}

/// Directed dependency graph over leaf tasks.
///
/// Edges point from predecessor to dependent. Node and edge iteration order
/// is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: Vec<Dependency>,
    /// Outgoing edge indices per predecessor
    successors: BTreeMap<String, Vec<usize>>,
    /// Incoming edge indices per dependent
    predecessors: BTreeMap<String, Vec<usize>>,
}

impl DependencyGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node
    pub fn add_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.successors.entry(id.clone()).or_default();
        self.predecessors.entry(id.clone()).or_default();
        self.nodes.insert(id);
    }

    /// Adds an edge; both endpoints must already be nodes
    pub fn add_edge(&mut self, dependency: Dependency) -> Result<()> {
        if !self.nodes.contains(&dependency.depends_on) {
            return Err(SchedulingError::UnknownTask(dependency.depends_on));
        }
        if !self.nodes.contains(&dependency.task_id) {
            return Err(SchedulingError::UnknownTask(dependency.task_id));
        }
        // Duplicate edges of the same kind carry no extra information.
        if self.edges.iter().any(|e| {
            e.task_id == dependency.task_id
                && e.depends_on == dependency.depends_on
                && e.kind == dependency.kind
        }) {
            return Ok(());
        }

        let index = self.edges.len();
        self.successors
            .entry(dependency.depends_on.clone())
            .or_default()
            .push(index);
        self.predecessors
            .entry(dependency.task_id.clone())
            .or_default()
            .push(index);
        self.edges.push(dependency);
        Ok(())
    }

    /// Node ids in deterministic order
    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All edges
    pub fn edges(&self) -> &[Dependency] {
        &self.edges
    }

    /// Whether the graph contains the node
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    /// Edges where `id` is the predecessor
    pub fn successors_of(&self, id: &str) -> impl Iterator<Item = &Dependency> {
        self.successors
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Edges where `id` is the dependent
    pub fn predecessors_of(&self, id: &str) -> impl Iterator<Item = &Dependency> {
        self.predecessors
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Whether `to` is reachable from `from` along dependency edges
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited = BTreeSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for edge in self.successors_of(&current) {
                if edge.task_id == to {
                    return true;
                }
                if !visited.contains(&edge.task_id) {
                    stack.push(edge.task_id.clone());
                }
            }
        }
        false
    }

    /// Topological order of all nodes; fails on a cycle
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<String, usize> =
            self.nodes.iter().map(|n| (n.clone(), 0)).collect();
        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(&edge.task_id) {
                *degree += 1;
            }
        }

        // Ready nodes drain in id order so the sort is deterministic.
        let mut ready: BTreeSet<String> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| node.clone())
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.iter().next().cloned() {
            ready.remove(&node);
            sorted.push(node.clone());
            for edge in self.successors_of(&node) {
                if let Some(degree) = in_degree.get_mut(&edge.task_id) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(edge.task_id.clone());
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            match self.find_cycle() {
                Some(cycle) => Err(SchedulingError::CycleDetected { cycle }),
                None => Err(SchedulingError::CycleDetected { cycle: Vec::new() }),
            }
        } else {
            Ok(sorted)
        }
    }

    /// Finds a cycle via three-color depth-first search.
    ///
    /// Returns the exact cycle as an ordered task-id list whose first and
    /// last elements close the loop, e.g. a self-loop reports `[T4, T4]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: BTreeMap<&String, Color> =
            self.nodes.iter().map(|n| (n, Color::White)).collect();

        for start in &self.nodes {
            if colors[&start] != Color::White {
                continue;
            }
            let mut path: Vec<&String> = Vec::new();
            // (node, next successor edge offset)
            let mut stack: Vec<(&String, usize)> = vec![(start, 0)];
            colors.insert(start, Color::Gray);
            path.push(start);

            while let Some((node, offset)) = stack.pop() {
                let outgoing = self.successors.get(node.as_str());
                let next = outgoing.and_then(|edges| edges.get(offset));
                match next {
                    Some(&edge_index) => {
                        stack.push((node, offset + 1));
                        let target = &self.edges[edge_index].task_id;
                        match colors[target] {
                            Color::Gray => {
                                // Close the loop at the first repeat.
                                let from = path
                                    .iter()
                                    .position(|n| *n == target)
                                    .unwrap_or(0);
                                let mut cycle: Vec<String> =
                                    path[from..].iter().map(|n| (*n).clone()).collect();
                                cycle.push(target.clone());
                                return Some(cycle);
                            }
                            Color::White => {
                                colors.insert(target, Color::Gray);
                                path.push(target);
                                stack.push((target, 0));
                            }
                            Color::Black => {}
                        }
                    }
                    None => {
                        colors.insert(node, Color::Black);
                        path.pop();
                    }
                }
            }
        }
        None
    }

    /// Serializable snapshot of nodes and edges
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.iter().cloned().collect(),
            edges: self.edges.clone(),
        }
    }
}

/// Builds a dependency graph from a task tree plus explicit dependency
/// declarations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphBuilder {
    options: GraphOptions,
}

impl DependencyGraphBuilder {
    /// Creates a builder with the given options
    pub fn new(options: GraphOptions) -> Self {
        Self { options }
    }

    /// Builds the graph.
    ///
    /// Nodes are the tree's leaf tasks. Edges come from the tree's own
    /// sibling chains plus `explicit` declarations; container endpoints are
    /// projected onto their entry/exit leaves. A cycle is always a hard
    /// error carrying the exact cycle path; edges are never dropped to
    /// repair one.
    pub fn build(
        &self,
        tree: &TaskTree,
        explicit: &[Dependency],
        resources: &[ResourceSpecification],
    ) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for id in tree.leaf_ids() {
            graph.add_node(id);
        }

        for task in tree.tasks.values() {
            for dep in &task.dependencies {
                self.add_projected(&mut graph, tree, dep)?;
            }
        }
        for dep in explicit {
            self.add_projected(&mut graph, tree, dep)?;
        }

        if self.options.infer_resource_ordering {
            infer_resource_edges(&mut graph, tree, resources)?;
        }

        if let Some(cycle) = graph.find_cycle() {
            return Err(SchedulingError::CycleDetected { cycle });
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            "dependency graph built"
        );
        Ok(graph)
    }

    fn add_projected(
        &self,
        graph: &mut DependencyGraph,
        tree: &TaskTree,
        dep: &Dependency,
    ) -> Result<()> {
        if !tree.contains(&dep.task_id) {
            return Err(SchedulingError::UnknownTask(dep.task_id.clone()));
        }
        if !tree.contains(&dep.depends_on) {
            return Err(SchedulingError::UnknownTask(dep.depends_on.clone()));
        }
        // Hierarchy containment and dependency edges are distinct relations
        // and must not conflict.
        if tree.is_ancestor(&dep.depends_on, &dep.task_id)
            || tree.is_ancestor(&dep.task_id, &dep.depends_on)
        {
            return Err(SchedulingError::HierarchyConflict {
                task: dep.task_id.clone(),
                depends_on: dep.depends_on.clone(),
            });
        }

        for exit in exit_leaves(tree, &dep.depends_on) {
            for entry in entry_leaves(tree, &dep.task_id) {
                graph.add_edge(Dependency {
                    task_id: entry.clone(),
                    depends_on: exit.clone(),
                    kind: dep.kind,
                    strength: dep.strength,
                    lag_hours: dep.lag_hours,
                })?;
            }
        }
        Ok(())
    }
}

/// Leaves where execution of a (possibly container) task begins.
///
/// Split children form a linear finish-to-start chain, so a container's
/// execution begins in its first child.
fn entry_leaves(tree: &TaskTree, id: &str) -> Vec<String> {
    match tree.get(id) {
        Some(task) if task.is_leaf() => vec![task.id.clone()],
        Some(task) => match task.children.first() {
            Some(first) => entry_leaves(tree, first),
            None => Vec::new(),
        },
        None => Vec::new(),
    }
}

/// Leaves where execution of a (possibly container) task ends
fn exit_leaves(tree: &TaskTree, id: &str) -> Vec<String> {
    match tree.get(id) {
        Some(task) if task.is_leaf() => vec![task.id.clone()],
        Some(task) => match task.children.last() {
            Some(last) => exit_leaves(tree, last),
            None => Vec::new(),
        },
        None => Vec::new(),
    }
}

/// Adds soft ordering edges between leaf pairs that can never overlap on a
/// shared resource. Pairs order by ascending task id; an edge is skipped
/// when the pair is already transitively ordered the other way.
fn infer_resource_edges(
    graph: &mut DependencyGraph,
    tree: &TaskTree,
    resources: &[ResourceSpecification],
) -> Result<()> {
    for resource in resources {
        let mut demanding: Vec<(String, f64)> = tree
            .tasks
            .values()
            .filter(|t| t.is_leaf())
            .filter_map(|t| {
                t.resource_requirements
                    .iter()
                    .find(|r| r.resource_type == resource.resource_type)
                    .map(|r| (t.id.clone(), r.quantity))
            })
            .collect();
        demanding.sort_by(|a, b| compare_task_ids(&a.0, &b.0));

        for i in 0..demanding.len() {
            for j in (i + 1)..demanding.len() {
                let (first, first_quantity) = &demanding[i];
                let (second, second_quantity) = &demanding[j];
                if first_quantity + second_quantity <= resource.capacity + 1e-9 {
                    continue;
                }
                if graph.reaches(second, first) {
                    continue;
                }
                graph.add_edge(Dependency {
                    task_id: second.clone(),
                    depends_on: first.clone(),
                    kind: DependencyKind::ResourceConstraint,
                    strength: DependencyStrength::Soft,
                    lag_hours: 0.0,
                })?;
            }
        }
    }
    Ok(())
}
