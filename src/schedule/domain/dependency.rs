//! Finish-to-start dependency edges and the project dependency graph.

use super::{ScheduleDomainError, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A finish-to-start edge: `dependent` may not start before `blocker`
/// finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    dependent: TaskId,
    blocker: TaskId,
}

impl DependencyEdge {
    /// Creates an edge between two distinct tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::SelfDependency`] when both ends are the
    /// same task.
    pub fn new(dependent: TaskId, blocker: TaskId) -> Result<Self, ScheduleDomainError> {
        if dependent == blocker {
            return Err(ScheduleDomainError::SelfDependency(dependent));
        }
        Ok(Self { dependent, blocker })
    }

    /// Returns the waiting task.
    #[must_use]
    pub const fn dependent(&self) -> TaskId {
        self.dependent
    }

    /// Returns the task being waited on.
    #[must_use]
    pub const fn blocker(&self) -> TaskId {
        self.blocker
    }
}

/// Dependency edges indexed in both directions.
///
/// Ordered collections keep every traversal reproducible for the same input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    blockers: BTreeMap<TaskId, BTreeSet<TaskId>>,
    dependents: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a list of edges. Duplicates collapse.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = DependencyEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.insert(edge);
        }
        graph
    }

    /// Adds an edge. Returns `false` when it was already present.
    ///
    /// Cycle checks are the caller's job; see
    /// [`would_create_cycle`](super::would_create_cycle).
    pub fn insert(&mut self, edge: DependencyEdge) -> bool {
        let added = self
            .blockers
            .entry(edge.dependent)
            .or_default()
            .insert(edge.blocker);
        self.dependents
            .entry(edge.blocker)
            .or_default()
            .insert(edge.dependent);
        added
    }

    /// Removes an edge. Returns `false` when it was absent.
    pub fn remove(&mut self, edge: &DependencyEdge) -> bool {
        let removed = remove_from(&mut self.blockers, edge.dependent, edge.blocker);
        remove_from(&mut self.dependents, edge.blocker, edge.dependent);
        removed
    }

    /// Returns `true` when the edge is present.
    #[must_use]
    pub fn contains(&self, edge: &DependencyEdge) -> bool {
        self.blockers
            .get(&edge.dependent)
            .is_some_and(|set| set.contains(&edge.blocker))
    }

    /// Direct blockers of `task`, in id order.
    pub fn direct_predecessors(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.blockers.get(&task).into_iter().flatten().copied()
    }

    /// Tasks directly waiting on `task`, in id order.
    pub fn direct_dependents(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.dependents.get(&task).into_iter().flatten().copied()
    }

    /// Every edge, ordered by dependent then blocker.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.blockers.iter().flat_map(|(dependent, blockers)| {
            blockers.iter().map(|blocker| DependencyEdge {
                dependent: *dependent,
                blocker: *blocker,
            })
        })
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.blockers.values().map(BTreeSet::len).sum()
    }

    /// `roots` plus every task transitively depending on any of them.
    #[must_use]
    pub fn downstream_closure(&self, roots: impl IntoIterator<Item = TaskId>) -> BTreeSet<TaskId> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<TaskId> = roots.into_iter().collect();
        while let Some(current) = stack.pop() {
            if !closure.insert(current) {
                continue;
            }
            stack.extend(
                self.direct_dependents(current)
                    .filter(|dependent| !closure.contains(dependent)),
            );
        }
        closure
    }
}

fn remove_from(index: &mut BTreeMap<TaskId, BTreeSet<TaskId>>, key: TaskId, value: TaskId) -> bool {
    let Some(set) = index.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(&value);
    if set.is_empty() {
        index.remove(&key);
    }
    removed
}
