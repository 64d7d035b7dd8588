//! Service layer for dependency maintenance and schedule propagation.

use crate::schedule::{
    domain::{
        CausalChain, DependencyEdge, DependencyGraph, LedgerError, ProjectId, PropagationPlan,
        RootChange, ScheduleChangeReason, ScheduleChanged, ScheduleConfig, ScheduleDomainError,
        ScheduleEngineError, ScheduleHistoryEntry, ScheduleLedger, ScheduleSnapshot,
        ScheduledTask, TaskId, TaskStatus, UserId, propagate, validate_new_edge,
    },
    ports::{
        ScheduleCommit, ScheduleHistoryRepository, ScheduleRepositoryError, TaskGraphRepository,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Mutex as ProjectMutex;
use tracing::{debug, info};

/// Request payload for adding a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddDependencyRequest {
    dependent: TaskId,
    blocker: TaskId,
}

impl AddDependencyRequest {
    /// Creates a request making `dependent` wait on `blocker`.
    #[must_use]
    pub const fn new(dependent: TaskId, blocker: TaskId) -> Self {
        Self { dependent, blocker }
    }

    /// Returns the waiting task.
    #[must_use]
    pub const fn dependent(&self) -> TaskId {
        self.dependent
    }

    /// Returns the blocking task.
    #[must_use]
    pub const fn blocker(&self) -> TaskId {
        self.blocker
    }
}

/// Request payload for completing a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteTaskRequest {
    task_id: TaskId,
    actual_end: Option<DateTime<Utc>>,
    changed_by: Option<UserId>,
}

impl CompleteTaskRequest {
    /// Creates a request completing `task_id` at the current clock time.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            actual_end: None,
            changed_by: None,
        }
    }

    /// Records a specific completion time instead of the clock time.
    #[must_use]
    pub const fn with_actual_end(mut self, actual_end: DateTime<Utc>) -> Self {
        self.actual_end = Some(actual_end);
        self
    }

    /// Attributes the completion to a user.
    #[must_use]
    pub const fn with_changed_by(mut self, user_id: UserId) -> Self {
        self.changed_by = Some(user_id);
        self
    }
}

/// Request payload for moving a task's planned dates by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideScheduleRequest {
    task_id: TaskId,
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
    changed_by: Option<UserId>,
}

impl OverrideScheduleRequest {
    /// Creates a request replacing `task_id`'s planned dates.
    #[must_use]
    pub const fn new(task_id: TaskId, new_start: DateTime<Utc>, new_end: DateTime<Utc>) -> Self {
        Self {
            task_id,
            new_start,
            new_end,
            changed_by: None,
        }
    }

    /// Attributes the override to a user.
    #[must_use]
    pub const fn with_changed_by(mut self, user_id: UserId) -> Self {
        self.changed_by = Some(user_id);
        self
    }
}

/// Committed result of one propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// The plan that was committed.
    pub plan: PropagationPlan,
    /// Dependents moved from `blocked` back to `todo` in the same commit.
    pub unblocked: Vec<TaskId>,
}

impl PropagationOutcome {
    /// One notification per task whose planned dates moved.
    #[must_use]
    pub fn notifications(&self) -> Vec<ScheduleChanged> {
        self.plan.notifications()
    }
}

/// Service-level errors for schedule operations.
#[derive(Debug, Error)]
pub enum ScheduleServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ScheduleDomainError),
    /// The engine rejected the change.
    #[error(transparent)]
    Engine(#[from] ScheduleEngineError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ScheduleRepositoryError),
    /// The stored ledger failed verification.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// The two ends of a dependency belong to different projects.
    #[error("dependency {dependent} -> {blocker} crosses projects")]
    CrossProject {
        /// Waiting task.
        dependent: TaskId,
        /// Blocking task.
        blocker: TaskId,
    },
    /// The project lock registry was poisoned.
    #[error("project lock registry poisoned")]
    LockPoisoned,
}

/// Result type for schedule service operations.
pub type ScheduleServiceResult<T> = Result<T, ScheduleServiceError>;

/// Schedule propagation orchestration service.
///
/// Every mutating operation holds its project's lock from snapshot load to
/// commit, so propagations within one project are serialized while
/// different projects proceed in parallel.
pub struct SchedulePropagationService<S, C>
where
    S: TaskGraphRepository + ScheduleHistoryRepository,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    config: ScheduleConfig,
    locks: Mutex<HashMap<ProjectId, Arc<ProjectMutex<()>>>>,
}

impl<S, C> SchedulePropagationService<S, C>
where
    S: TaskGraphRepository + ScheduleHistoryRepository,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self::with_config(store, clock, ScheduleConfig::default())
    }

    /// Creates a service with an explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<S>, clock: Arc<C>, config: ScheduleConfig) -> Self {
        Self {
            store,
            clock,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Adds a dependency edge after checking it keeps the graph acyclic.
    ///
    /// A `todo` dependent is blocked when its new blocker is unfinished. Both
    /// tasks are read under the project lock and the edge is stored together
    /// with the status change. Planned dates are not moved; propagation runs
    /// on the next root change.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Engine`] with
    /// [`ScheduleEngineError::CycleDetected`] for self-edges and edges that
    /// close a cycle, [`ScheduleServiceError::CrossProject`] when the tasks
    /// belong to different projects, and repository errors otherwise.
    pub async fn add_dependency(
        &self,
        request: AddDependencyRequest,
    ) -> ScheduleServiceResult<DependencyEdge> {
        let project_id = self.require_task(request.dependent).await?.project_id();
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.load_snapshot(project_id).await?;
        let dependent = snapshot
            .task(request.dependent)
            .ok_or(ScheduleServiceError::TaskNotFound(request.dependent))?;
        let Some(blocker) = snapshot.task(request.blocker) else {
            self.require_task(request.blocker).await?;
            return Err(ScheduleServiceError::CrossProject {
                dependent: request.dependent,
                blocker: request.blocker,
            });
        };
        let edge = validate_new_edge(request.dependent, request.blocker, snapshot.graph())?;

        let mut tasks = Vec::new();
        if dependent.status() == TaskStatus::Todo && !blocker.status().is_frozen() {
            let mut blocked = dependent.clone();
            blocked.block()?;
            tasks.push(blocked);
        }
        self.store
            .commit_schedule(ScheduleCommit {
                project_id,
                tasks,
                edges: vec![edge],
                ..ScheduleCommit::default()
            })
            .await?;
        info!(
            project = %project_id,
            dependent = %edge.dependent(),
            blocker = %edge.blocker(),
            "dependency added"
        );
        Ok(edge)
    }

    /// Removes a dependency edge.
    ///
    /// Returns `false` when the edge did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Repository`] when persistence fails.
    pub async fn remove_dependency(
        &self,
        dependent: TaskId,
        blocker: TaskId,
    ) -> ScheduleServiceResult<bool> {
        let task = self.require_task(dependent).await?;
        let edge = DependencyEdge::new(dependent, blocker)?;
        let lock = self.project_lock(task.project_id())?;
        let _guard = lock.lock().await;
        let removed = self.store.remove_dependency(&edge).await?;
        info!(
            project = %task.project_id(),
            dependent = %dependent,
            blocker = %blocker,
            removed,
            "dependency removed"
        );
        Ok(removed)
    }

    /// Propagates externally supplied root changes through a project.
    ///
    /// A root for a finished task whose finish is already in the ledger has
    /// been propagated before and is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Engine`] when the engine rejects the
    /// roots or the graph, and [`ScheduleServiceError::Repository`] when the
    /// commit fails. Nothing is committed on error.
    pub async fn propagate(
        &self,
        project_id: ProjectId,
        roots: &[RootChange],
    ) -> ScheduleServiceResult<PropagationOutcome> {
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;
        let snapshot = self.load_snapshot(project_id).await?;
        let ledger = self.store.load_ledger(project_id).await?;
        let pending: Vec<RootChange> = roots
            .iter()
            .filter(|root| !finish_already_recorded(&snapshot, &ledger, root))
            .copied()
            .collect();
        if pending.len() < roots.len() {
            debug!(
                project = %project_id,
                dropped = roots.len() - pending.len(),
                "root changes already recorded in the ledger"
            );
        }
        let plan = propagate(&snapshot, &pending, &self.config, self.clock.utc())?;
        self.commit(project_id, Vec::new(), plan, Vec::new()).await
    }

    /// Completes a task and propagates its actual finish downstream.
    ///
    /// Blocked dependents whose blockers are now all finished return to
    /// `todo` in the same commit.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Domain`] when the task cannot be
    /// completed, plus the errors of [`Self::propagate`].
    pub async fn complete_task(
        &self,
        request: CompleteTaskRequest,
    ) -> ScheduleServiceResult<PropagationOutcome> {
        let project_id = self.require_task(request.task_id).await?.project_id();
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;

        let mut snapshot = self.load_snapshot(project_id).await?;
        let mut task = snapshot
            .task(request.task_id)
            .cloned()
            .ok_or(ScheduleServiceError::TaskNotFound(request.task_id))?;
        let old_end = task.expected_end();
        let actual_end = request.actual_end.unwrap_or_else(|| self.clock.utc());
        task.complete(actual_end)?;
        snapshot.upsert_task(task.clone());

        let released = release_ready_dependents(&mut snapshot, request.task_id)?;
        let mut root = RootChange::new(
            request.task_id,
            old_end,
            actual_end,
            ScheduleChangeReason::TaskCompleted,
        );
        if let Some(user_id) = request.changed_by {
            root = root.changed_by(user_id);
        }
        let plan = propagate(&snapshot, &[root], &self.config, self.clock.utc())?;

        let unblocked = released.iter().map(ScheduledTask::id).collect();
        let mut tasks = vec![task];
        tasks.extend(released);
        self.commit(project_id, tasks, plan, unblocked).await
    }

    /// Cancels a task and propagates its cancellation time downstream.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Domain`] when the task cannot be
    /// cancelled, plus the errors of [`Self::propagate`].
    pub async fn cancel_task(
        &self,
        task_id: TaskId,
        changed_by: Option<UserId>,
    ) -> ScheduleServiceResult<PropagationOutcome> {
        let project_id = self.require_task(task_id).await?.project_id();
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;

        let mut snapshot = self.load_snapshot(project_id).await?;
        let mut task = snapshot
            .task(task_id)
            .cloned()
            .ok_or(ScheduleServiceError::TaskNotFound(task_id))?;
        let old_end = task.expected_end();
        let cancelled_at = self.clock.utc();
        task.cancel(cancelled_at)?;
        snapshot.upsert_task(task.clone());

        let released = release_ready_dependents(&mut snapshot, task_id)?;
        let mut root = RootChange::new(
            task_id,
            old_end,
            cancelled_at,
            ScheduleChangeReason::TaskCancelled,
        );
        if let Some(user_id) = changed_by {
            root = root.changed_by(user_id);
        }
        let plan = propagate(&snapshot, &[root], &self.config, cancelled_at)?;

        let unblocked = released.iter().map(ScheduledTask::id).collect();
        let mut tasks = vec![task];
        tasks.extend(released);
        self.commit(project_id, tasks, plan, unblocked).await
    }

    /// Starts a task, recording its actual start from the clock.
    ///
    /// Planned dates do not move, so nothing is propagated.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Domain`] when the task cannot start.
    pub async fn start_task(&self, task_id: TaskId) -> ScheduleServiceResult<ScheduledTask> {
        let project_id = self.require_task(task_id).await?.project_id();
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;

        let mut task = self.require_task(task_id).await?;
        task.start(self.clock.utc())?;
        self.store.update_task(&task).await?;
        info!(project = %project_id, task = %task_id, "task started");
        Ok(task)
    }

    /// Replaces a task's planned dates by hand and propagates the change.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ScheduleFrozen`] for finished tasks and
    /// [`ScheduleDomainError::InvertedPlannedDates`] when the end precedes
    /// the start, plus the errors of [`Self::propagate`].
    pub async fn override_schedule(
        &self,
        request: OverrideScheduleRequest,
    ) -> ScheduleServiceResult<PropagationOutcome> {
        let project_id = self.require_task(request.task_id).await?.project_id();
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.load_snapshot(project_id).await?;
        let task = snapshot
            .task(request.task_id)
            .ok_or(ScheduleServiceError::TaskNotFound(request.task_id))?;
        task.clone()
            .reschedule(Some(request.new_start), Some(request.new_end))?;

        let mut root = RootChange::new(
            request.task_id,
            task.expected_end(),
            request.new_end,
            ScheduleChangeReason::ManualOverride,
        )
        .with_new_start(request.new_start);
        if let Some(user_id) = request.changed_by {
            root = root.changed_by(user_id);
        }
        let plan = propagate(&snapshot, &[root], &self.config, self.clock.utc())?;
        self.commit(project_id, Vec::new(), plan, Vec::new()).await
    }

    /// Returns a task's schedule history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Repository`] when the lookup fails.
    pub async fn history(
        &self,
        task_id: TaskId,
    ) -> ScheduleServiceResult<Vec<ScheduleHistoryEntry>> {
        Ok(self.store.find_history(task_id).await?)
    }

    /// Explains why a task's schedule moved.
    ///
    /// The stored ledger is verified before the chain is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleServiceError::Ledger`] when the ledger fails
    /// verification and [`ScheduleServiceError::TaskNotFound`] for unknown
    /// tasks.
    pub async fn delay_chain(&self, task_id: TaskId) -> ScheduleServiceResult<CausalChain> {
        let project_id = self.require_task(task_id).await?.project_id();
        let ledger = self.store.load_ledger(project_id).await?;
        ledger.verify()?;
        Ok(ledger.reconstruct_chain(task_id, &self.config))
    }

    async fn require_task(&self, task_id: TaskId) -> ScheduleServiceResult<ScheduledTask> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or(ScheduleServiceError::TaskNotFound(task_id))
    }

    async fn load_snapshot(
        &self,
        project_id: ProjectId,
    ) -> ScheduleServiceResult<ScheduleSnapshot> {
        let tasks = self.store.list_tasks(project_id).await?;
        let edges = self.store.list_edges(project_id).await?;
        Ok(ScheduleSnapshot::new(tasks, DependencyGraph::from_edges(edges)))
    }

    async fn commit(
        &self,
        project_id: ProjectId,
        tasks: Vec<ScheduledTask>,
        plan: PropagationPlan,
        unblocked: Vec<TaskId>,
    ) -> ScheduleServiceResult<PropagationOutcome> {
        let commit = ScheduleCommit {
            project_id,
            tasks,
            edges: Vec::new(),
            updates: plan.updates.clone(),
            entries: plan.entries.clone(),
        };
        if !commit.is_empty() {
            self.store.commit_schedule(commit).await?;
        }
        info!(
            project = %project_id,
            mutations = plan.entries.len(),
            skipped = plan.skipped.len(),
            unblocked = unblocked.len(),
            "schedule propagation committed"
        );
        Ok(PropagationOutcome { plan, unblocked })
    }

    fn project_lock(&self, project_id: ProjectId) -> ScheduleServiceResult<Arc<ProjectMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ScheduleServiceError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(project_id).or_default()))
    }
}

/// Returns `true` when `root` finishes an already finished task at the
/// finish its ledger records.
fn finish_already_recorded(
    snapshot: &ScheduleSnapshot,
    ledger: &ScheduleLedger,
    root: &RootChange,
) -> bool {
    snapshot.task(root.task_id).is_some_and(|task| {
        task.status().is_frozen()
            && task.actual_end() == Some(root.new_end)
            && ledger.records_finish(root.task_id, root.new_end)
    })
}

/// Returns blocked dependents of `finished` with no unfinished blocker left,
/// already moved to `todo` and staged in `snapshot`.
fn release_ready_dependents(
    snapshot: &mut ScheduleSnapshot,
    finished: TaskId,
) -> Result<Vec<ScheduledTask>, ScheduleDomainError> {
    let ready: Vec<ScheduledTask> = snapshot
        .graph()
        .direct_dependents(finished)
        .filter_map(|id| snapshot.task(id))
        .filter(|task| task.status() == TaskStatus::Blocked)
        .filter(|task| {
            snapshot.graph().direct_predecessors(task.id()).all(|blocker| {
                snapshot
                    .task(blocker)
                    .is_some_and(|candidate| candidate.status().is_frozen())
            })
        })
        .cloned()
        .collect();

    let mut released = Vec::with_capacity(ready.len());
    for mut task in ready {
        task.unblock()?;
        snapshot.upsert_task(task.clone());
        released.push(task);
    }
    Ok(released)
}
