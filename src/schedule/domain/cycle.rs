//! Cycle validation for candidate dependency edges.

use super::{DependencyEdge, DependencyGraph, ScheduleEngineError, TaskId};
use std::collections::BTreeSet;

/// Returns `true` when adding `dependent -> blocker` would close a cycle.
///
/// A self-edge is always a cycle. Otherwise the edge closes a cycle exactly
/// when `dependent` is already reachable from `blocker` by following blocker
/// edges. The search visits each reachable task once.
#[must_use]
pub fn would_create_cycle(dependent: TaskId, blocker: TaskId, graph: &DependencyGraph) -> bool {
    if dependent == blocker {
        return true;
    }

    let mut visited = BTreeSet::new();
    let mut stack = vec![blocker];
    while let Some(current) = stack.pop() {
        if current == dependent {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        stack.extend(
            graph
                .direct_predecessors(current)
                .filter(|next| !visited.contains(next)),
        );
    }
    false
}

/// Builds the edge `dependent -> blocker` if it may join `graph`.
///
/// # Errors
///
/// Returns [`ScheduleEngineError::CycleDetected`] for a self-edge and for an
/// edge that would close a cycle.
pub fn validate_new_edge(
    dependent: TaskId,
    blocker: TaskId,
    graph: &DependencyGraph,
) -> Result<DependencyEdge, ScheduleEngineError> {
    let cycle = || ScheduleEngineError::CycleDetected { dependent, blocker };
    if would_create_cycle(dependent, blocker, graph) {
        return Err(cycle());
    }
    DependencyEdge::new(dependent, blocker).map_err(|_| cycle())
}
