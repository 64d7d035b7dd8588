//! Forward propagation of date changes through the dependency DAG.
//!
//! A propagation takes one or more root changes, collects every task
//! downstream of them, orders that closure topologically and walks it exactly
//! once. Each task is resolved against the already-resolved finishes of its
//! direct blockers, so converging paths contribute the maximum of their
//! effects and re-running a propagation against its own result changes
//! nothing. A done or cancelled root never has its planned dates rewritten;
//! callers drop a root whose finish the ledger already records.

use super::{
    DependencyGraph, PredecessorFinish, ResolverDataError, ScheduleChange, ScheduleChangeReason,
    ScheduleConfig, ScheduleEngineError, ScheduleHistoryEntry, ScheduledTask, TaskId, UserId,
    resolve, topological_order,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// An externally supplied date change that seeds a propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootChange {
    /// Task whose finish moved.
    pub task_id: TaskId,
    /// The finish the caller believed the task had.
    pub old_end: Option<DateTime<Utc>>,
    /// The task's new finish.
    pub new_end: DateTime<Utc>,
    /// A new planned start, when the change also moves the start.
    pub new_start: Option<DateTime<Utc>>,
    /// Why the root moved.
    pub reason: ScheduleChangeReason,
    /// Task that caused the root change, if any.
    pub causing_task_id: Option<TaskId>,
    /// User who triggered the root change, if any.
    pub changed_by: Option<UserId>,
}

impl RootChange {
    /// Creates a root change moving `task_id`'s finish to `new_end`.
    #[must_use]
    pub const fn new(
        task_id: TaskId,
        old_end: Option<DateTime<Utc>>,
        new_end: DateTime<Utc>,
        reason: ScheduleChangeReason,
    ) -> Self {
        Self {
            task_id,
            old_end,
            new_end,
            new_start: None,
            reason,
            causing_task_id: None,
            changed_by: None,
        }
    }

    /// Also moves the planned start.
    #[must_use]
    pub const fn with_new_start(mut self, new_start: DateTime<Utc>) -> Self {
        self.new_start = Some(new_start);
        self
    }

    /// Attributes the change to another task.
    #[must_use]
    pub const fn caused_by(mut self, task_id: TaskId) -> Self {
        self.causing_task_id = Some(task_id);
        self
    }

    /// Attributes the change to a user.
    #[must_use]
    pub const fn changed_by(mut self, user_id: UserId) -> Self {
        self.changed_by = Some(user_id);
        self
    }
}

/// Read-only view of a project's tasks and dependency edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    tasks: BTreeMap<TaskId, ScheduledTask>,
    graph: DependencyGraph,
}

impl ScheduleSnapshot {
    /// Creates a snapshot from tasks and their edges.
    #[must_use]
    pub fn new(tasks: impl IntoIterator<Item = ScheduledTask>, graph: DependencyGraph) -> Self {
        Self {
            tasks: tasks.into_iter().map(|task| (task.id(), task)).collect(),
            graph,
        }
    }

    /// Looks up a task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&ScheduledTask> {
        self.tasks.get(&id)
    }

    /// Every task, in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.values()
    }

    /// The dependency graph.
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Replaces a task, e.g. after a lifecycle change staged by the caller.
    pub fn upsert_task(&mut self, task: ScheduledTask) {
        self.tasks.insert(task.id(), task);
    }
}

/// New planned dates for one task, to be persisted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleUpdate {
    /// Task to update.
    pub task_id: TaskId,
    /// New planned start.
    pub new_start: Option<DateTime<Utc>>,
    /// New planned end.
    pub new_end: Option<DateTime<Utc>>,
}

/// Why a task was left out of a propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipCause {
    /// The task's own data could not be resolved.
    ResolverData(ResolverDataError),
    /// A blocker upstream was skipped.
    UpstreamSkipped(TaskId),
    /// A dependency edge refers to a task missing from the snapshot.
    MissingTask,
}

/// A task the propagation did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    /// Skipped task.
    pub task_id: TaskId,
    /// Why it was skipped.
    pub cause: SkipCause,
}

/// Notification the caller emits once per mutated task after committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChanged {
    /// Mutated task.
    pub task_id: TaskId,
    /// Planned start before the change.
    pub old_expected_start: Option<DateTime<Utc>>,
    /// Planned end before the change.
    pub old_expected_end: Option<DateTime<Utc>>,
    /// Planned start after the change.
    pub new_expected_start: Option<DateTime<Utc>>,
    /// Planned end after the change.
    pub new_expected_end: Option<DateTime<Utc>>,
    /// Task whose change caused this one.
    pub causing_task_id: Option<TaskId>,
    /// Why the dates moved.
    pub reason: ScheduleChangeReason,
    /// When the change was computed.
    pub timestamp: DateTime<Utc>,
}

impl From<&ScheduleHistoryEntry> for ScheduleChanged {
    fn from(entry: &ScheduleHistoryEntry) -> Self {
        Self {
            task_id: entry.task_id(),
            old_expected_start: entry.old_expected_start(),
            old_expected_end: entry.old_expected_end(),
            new_expected_start: entry.new_expected_start(),
            new_expected_end: entry.new_expected_end(),
            causing_task_id: entry.causing_task_id(),
            reason: entry.reason(),
            timestamp: entry.created_at(),
        }
    }
}

/// The full outcome of one propagation, not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationPlan {
    /// Date updates, in topological order.
    pub updates: Vec<ScheduleUpdate>,
    /// History entries, in topological order. A done or cancelled root
    /// gets an entry but no update.
    pub entries: Vec<ScheduleHistoryEntry>,
    /// Tasks left unresolved.
    pub skipped: Vec<SkippedTask>,
}

impl PropagationPlan {
    /// Returns `true` when nothing needs to be committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.entries.is_empty()
    }

    /// The history entry recorded for `task_id`, if it moved.
    #[must_use]
    pub fn entry_for(&self, task_id: TaskId) -> Option<&ScheduleHistoryEntry> {
        self.entries.iter().find(|entry| entry.task_id() == task_id)
    }

    /// One notification per mutated task.
    #[must_use]
    pub fn notifications(&self) -> Vec<ScheduleChanged> {
        self.entries.iter().map(ScheduleChanged::from).collect()
    }
}

/// Amount by which a finished task overran its plan.
///
/// Returns `None` when the task has not finished, has no planned end, or
/// finished on time.
#[must_use]
pub fn detect_delay(task: &ScheduledTask) -> Option<TimeDelta> {
    task.is_delayed()
        .then(|| task.actual_end().zip(task.expected_end()))
        .flatten()
        .map(|(actual, expected)| actual - expected)
}

/// Resolved state of one task within a pass.
#[derive(Debug, Clone, Copy)]
struct WorkingDates {
    previous_finish: Option<DateTime<Utc>>,
    finish: Option<DateTime<Utc>>,
}

/// Pass-local state: resolved finishes and the plan being built.
struct Pass<'a> {
    snapshot: &'a ScheduleSnapshot,
    config: &'a ScheduleConfig,
    now: DateTime<Utc>,
    working: BTreeMap<TaskId, WorkingDates>,
    skipped_ids: BTreeSet<TaskId>,
    plan: PropagationPlan,
}

/// Computes every date mutation implied by `roots`.
///
/// # Errors
///
/// Returns [`ScheduleEngineError::UnknownTask`] or
/// [`ScheduleEngineError::DuplicateRootChange`] for invalid roots,
/// [`ScheduleEngineError::ScheduleInvariantViolation`] when the closure
/// contains a cycle, and [`ScheduleEngineError::ResolverData`] when a task
/// cannot be resolved and the configuration makes that fatal. No partial plan
/// is returned on error.
pub fn propagate(
    snapshot: &ScheduleSnapshot,
    roots: &[RootChange],
    config: &ScheduleConfig,
    now: DateTime<Utc>,
) -> Result<PropagationPlan, ScheduleEngineError> {
    let root_changes = index_roots(snapshot, roots)?;
    let closure = snapshot.graph.downstream_closure(root_changes.keys().copied());
    let order = topological_order(&closure, &snapshot.graph)?;
    debug!(
        roots = root_changes.len(),
        closure = closure.len(),
        "propagating schedule changes"
    );

    let mut pass = Pass {
        snapshot,
        config,
        now,
        working: BTreeMap::new(),
        skipped_ids: BTreeSet::new(),
        plan: PropagationPlan::default(),
    };
    for task_id in order {
        match root_changes.get(&task_id) {
            Some(root) => pass.apply_root(root),
            None => pass.resolve_dependent(task_id)?,
        }
    }

    debug!(
        mutations = pass.plan.entries.len(),
        skipped = pass.plan.skipped.len(),
        "propagation pass finished"
    );
    Ok(pass.plan)
}

fn index_roots<'r>(
    snapshot: &ScheduleSnapshot,
    roots: &'r [RootChange],
) -> Result<BTreeMap<TaskId, &'r RootChange>, ScheduleEngineError> {
    let mut indexed = BTreeMap::new();
    for root in roots {
        if snapshot.task(root.task_id).is_none() {
            return Err(ScheduleEngineError::UnknownTask(root.task_id));
        }
        if indexed.insert(root.task_id, root).is_some() {
            return Err(ScheduleEngineError::DuplicateRootChange(root.task_id));
        }
    }
    Ok(indexed)
}

impl Pass<'_> {
    /// Seeds the pass with a root's new finish.
    ///
    /// A done or cancelled root keeps its planned dates so the overrun stays
    /// visible; its entry records the finish against the plan and carries no
    /// update.
    fn apply_root(&mut self, root: &RootChange) {
        let snapshot = self.snapshot;
        let Some(task) = snapshot.task(root.task_id) else {
            return;
        };
        if root.old_end.is_some() && root.old_end != task.expected_end() {
            debug!(
                task = %root.task_id,
                "root change was computed against a stale planned end"
            );
        }

        let frozen = task.status().is_frozen();
        let new_start = if frozen {
            task.expected_start()
        } else {
            root.new_start.or(task.expected_start())
        };
        let new_end = Some(root.new_end);
        self.working.insert(
            root.task_id,
            WorkingDates {
                previous_finish: task.expected_end().or(root.old_end).or(new_end),
                finish: new_end,
            },
        );

        if new_start == task.expected_start() && new_end == task.expected_end() {
            return;
        }
        let change = ScheduleChange {
            task_id: root.task_id,
            old_expected_start: task.expected_start(),
            old_expected_end: task.expected_end(),
            new_expected_start: new_start,
            new_expected_end: new_end,
            reason: root.reason,
            causing_task_id: root.causing_task_id,
            changed_by: root.changed_by,
        };
        if frozen {
            self.record_entry(change);
        } else {
            self.record(change);
        }
    }

    fn resolve_dependent(&mut self, task_id: TaskId) -> Result<(), ScheduleEngineError> {
        let snapshot = self.snapshot;
        let Some(task) = snapshot.task(task_id) else {
            self.skip(task_id, SkipCause::MissingTask);
            return Ok(());
        };

        let predecessors = match self.predecessor_finishes(task_id) {
            Ok(predecessors) => predecessors,
            Err(upstream) => {
                self.skip(task_id, SkipCause::UpstreamSkipped(upstream));
                return Ok(());
            }
        };

        let resolution = match resolve(task, &predecessors, self.config) {
            Ok(resolution) => resolution,
            Err(err) if self.config.abort_on_resolver_error => return Err(err.into()),
            Err(err) => {
                self.skip(task_id, SkipCause::ResolverData(err));
                return Ok(());
            }
        };

        self.working.insert(
            task_id,
            WorkingDates {
                previous_finish: task.effective_finish(),
                finish: task.actual_end().or(resolution.new_end),
            },
        );

        if resolution.is_change() {
            let reason = if resolution.new_end < resolution.old_end {
                ScheduleChangeReason::DependencyEarly
            } else {
                ScheduleChangeReason::DependencyDelay
            };
            self.record(ScheduleChange {
                task_id,
                old_expected_start: resolution.old_start,
                old_expected_end: resolution.old_end,
                new_expected_start: resolution.new_start,
                new_expected_end: resolution.new_end,
                reason,
                causing_task_id: resolution.binding_predecessor,
                changed_by: None,
            });
        }
        Ok(())
    }

    /// Finishes of `task_id`'s direct blockers, or the first skipped blocker.
    fn predecessor_finishes(&self, task_id: TaskId) -> Result<Vec<PredecessorFinish>, TaskId> {
        let mut finishes = Vec::new();
        for blocker in self.snapshot.graph.direct_predecessors(task_id) {
            if self.skipped_ids.contains(&blocker) {
                return Err(blocker);
            }
            let finish = match self.working.get(&blocker) {
                Some(dates) => dates.finish.map(|finish| PredecessorFinish {
                    task_id: blocker,
                    previous_finish: dates.previous_finish.unwrap_or(finish),
                    finish,
                }),
                None => self
                    .snapshot
                    .task(blocker)
                    .and_then(ScheduledTask::effective_finish)
                    .map(|finish| PredecessorFinish::unchanged(blocker, finish)),
            };
            finishes.extend(finish);
        }
        Ok(finishes)
    }

    fn record(&mut self, change: ScheduleChange) {
        self.plan.updates.push(ScheduleUpdate {
            task_id: change.task_id,
            new_start: change.new_expected_start,
            new_end: change.new_expected_end,
        });
        self.record_entry(change);
    }

    fn record_entry(&mut self, change: ScheduleChange) {
        debug!(
            task = %change.task_id,
            reason = %change.reason,
            "schedule change recorded"
        );
        self.plan
            .entries
            .push(ScheduleHistoryEntry::new(change, self.now));
    }

    fn skip(&mut self, task_id: TaskId, cause: SkipCause) {
        warn!(task = %task_id, cause = ?cause, "task skipped during schedule propagation");
        self.skipped_ids.insert(task_id);
        self.plan.skipped.push(SkippedTask { task_id, cause });
    }
}
