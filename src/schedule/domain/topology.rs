//! Deterministic topological ordering of a task subgraph.

use super::{DependencyGraph, ScheduleEngineError, TaskId};
use std::collections::{BTreeMap, BTreeSet};

/// Orders `task_ids` so every blocker precedes its dependents.
///
/// Only edges with both ends inside `task_ids` are considered. Among tasks
/// that are ready at the same time, the smallest [`TaskId`] goes first, so the
/// same input always yields the same order.
///
/// # Errors
///
/// Returns [`ScheduleEngineError::ScheduleInvariantViolation`] when some
/// tasks never reach zero in-degree, which means the edges contain a cycle.
pub fn topological_order(
    task_ids: &BTreeSet<TaskId>,
    graph: &DependencyGraph,
) -> Result<Vec<TaskId>, ScheduleEngineError> {
    let mut in_degree: BTreeMap<TaskId, usize> = task_ids
        .iter()
        .map(|task| {
            let degree = graph
                .direct_predecessors(*task)
                .filter(|blocker| task_ids.contains(blocker))
                .count();
            (*task, degree)
        })
        .collect();

    let mut ready: BTreeSet<TaskId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(task, _)| *task)
        .collect();

    let mut order = Vec::with_capacity(task_ids.len());
    while let Some(current) = ready.pop_first() {
        order.push(current);
        for dependent in graph.direct_dependents(current) {
            let Some(degree) = in_degree.get_mut(&dependent) else {
                continue;
            };
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < task_ids.len() {
        let placed: BTreeSet<TaskId> = order.iter().copied().collect();
        let unresolved = task_ids.difference(&placed).copied().collect();
        return Err(ScheduleEngineError::ScheduleInvariantViolation { unresolved });
    }
    Ok(order)
}
