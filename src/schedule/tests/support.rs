//! Shared builders for schedule unit tests.

use crate::schedule::domain::{
    DependencyEdge, DependencyGraph, ProjectId, ScheduleSnapshot, ScheduledTask, TaskId,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Midnight UTC `offset` days after the fixed planning epoch.
pub(super) fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0)
        .single()
        .expect("planning epoch is a valid timestamp")
        + TimeDelta::days(offset)
}

/// A `todo` task planned from `start` to `end`, both in days.
pub(super) fn planned(project_id: ProjectId, start: i64, end: i64) -> ScheduledTask {
    ScheduledTask::planned(project_id, day(start), day(end)).expect("planned dates are ordered")
}

/// A `doing` task planned from `start` to `end` that started on `started_on`.
pub(super) fn started(
    project_id: ProjectId,
    start: i64,
    end: i64,
    started_on: i64,
) -> ScheduledTask {
    let mut task = planned(project_id, start, end);
    task.start(day(started_on)).expect("todo task can start");
    task
}

/// A `done` task planned from `start` to `end` that finished on `finished`.
pub(super) fn done(project_id: ProjectId, start: i64, end: i64, finished: i64) -> ScheduledTask {
    let mut task = started(project_id, start, end, start);
    task.complete(day(finished)).expect("doing task can complete");
    task
}

/// An edge making `dependent` wait on `blocker`.
pub(super) fn edge(dependent: TaskId, blocker: TaskId) -> DependencyEdge {
    DependencyEdge::new(dependent, blocker).expect("edge ends are distinct")
}

/// A graph built from `(dependent, blocker)` pairs.
pub(super) fn graph(pairs: &[(TaskId, TaskId)]) -> DependencyGraph {
    DependencyGraph::from_edges(
        pairs
            .iter()
            .map(|&(dependent, blocker)| edge(dependent, blocker)),
    )
}

/// A snapshot of `tasks` joined by `(dependent, blocker)` pairs.
pub(super) fn snapshot(tasks: &[&ScheduledTask], pairs: &[(TaskId, TaskId)]) -> ScheduleSnapshot {
    ScheduleSnapshot::new(tasks.iter().map(|&task| task.clone()), graph(pairs))
}
