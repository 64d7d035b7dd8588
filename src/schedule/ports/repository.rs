//! Repository ports for the task graph and the schedule history ledger.

use crate::schedule::domain::{
    DependencyEdge, LedgerError, ProjectId, ScheduleHistoryEntry, ScheduleLedger, ScheduleUpdate,
    ScheduledTask, TaskId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for schedule repository operations.
pub type ScheduleRepositoryResult<T> = Result<T, ScheduleRepositoryError>;

/// Everything one propagation persists, applied as a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleCommit {
    /// Project the batch belongs to.
    pub project_id: ProjectId,
    /// Tasks whose lifecycle changed; stored as given before `updates` apply.
    pub tasks: Vec<ScheduledTask>,
    /// New dependency edges; both ends must belong to the project.
    pub edges: Vec<DependencyEdge>,
    /// Planned-date updates computed by the engine.
    pub updates: Vec<ScheduleUpdate>,
    /// History entries to append. A finished root has an entry but no update.
    pub entries: Vec<ScheduleHistoryEntry>,
}

impl ScheduleCommit {
    /// Returns `true` when the commit would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.edges.is_empty()
            && self.updates.is_empty()
            && self.entries.is_empty()
    }
}

/// Task and dependency-edge store.
///
/// The engine only reads through this port; all writes of planned dates go
/// through [`TaskGraphRepository::commit_schedule`].
#[async_trait]
pub trait TaskGraphRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleRepositoryError::DuplicateTask`] when the id exists.
    async fn store_task(&self, task: &ScheduledTask) -> ScheduleRepositoryResult<()>;

    /// Overwrites a task's lifecycle state without touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleRepositoryError::TaskNotFound`] for unknown tasks.
    async fn update_task(&self, task: &ScheduledTask) -> ScheduleRepositoryResult<()>;

    /// Finds a task by id.
    async fn find_task(&self, id: TaskId) -> ScheduleRepositoryResult<Option<ScheduledTask>>;

    /// Every task of a project.
    async fn list_tasks(&self, project_id: ProjectId)
    -> ScheduleRepositoryResult<Vec<ScheduledTask>>;

    /// Every dependency edge of a project.
    async fn list_edges(&self, project_id: ProjectId)
    -> ScheduleRepositoryResult<Vec<DependencyEdge>>;

    /// Direct blockers of a task.
    async fn direct_predecessors(&self, id: TaskId) -> ScheduleRepositoryResult<Vec<TaskId>>;

    /// Tasks directly waiting on a task.
    async fn direct_dependents(&self, id: TaskId) -> ScheduleRepositoryResult<Vec<TaskId>>;

    /// Stores a validated edge.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleRepositoryError::DuplicateDependency`] when the edge
    /// exists and [`ScheduleRepositoryError::TaskNotFound`] when either end
    /// is unknown.
    async fn store_dependency(&self, edge: DependencyEdge) -> ScheduleRepositoryResult<()>;

    /// Deletes an edge. Returns `false` when it did not exist.
    async fn remove_dependency(&self, edge: &DependencyEdge) -> ScheduleRepositoryResult<bool>;

    /// Applies a batch atomically: task overwrites, new edges, planned-date
    /// updates and history entries are all stored, or none are.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleRepositoryError::TaskNotFound`],
    /// [`ScheduleRepositoryError::ProjectMismatch`],
    /// [`ScheduleRepositoryError::DuplicateDependency`] or
    /// [`ScheduleRepositoryError::Ledger`] when any part of the batch is
    /// invalid.
    async fn commit_schedule(&self, commit: ScheduleCommit) -> ScheduleRepositoryResult<()>;
}

/// Append-only schedule history store.
#[async_trait]
pub trait ScheduleHistoryRepository: Send + Sync {
    /// Appends entries to a project's ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleRepositoryError::Ledger`] when the batch breaks the
    /// ledger's ordering or uniqueness rules.
    async fn append_history(
        &self,
        project_id: ProjectId,
        entries: Vec<ScheduleHistoryEntry>,
    ) -> ScheduleRepositoryResult<()>;

    /// Entries for a task, oldest first.
    async fn find_history(&self, task_id: TaskId)
    -> ScheduleRepositoryResult<Vec<ScheduleHistoryEntry>>;

    /// A copy of a project's ledger, for chain reconstruction and
    /// verification.
    async fn load_ledger(&self, project_id: ProjectId) -> ScheduleRepositoryResult<ScheduleLedger>;
}

/// Errors returned by schedule repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ScheduleRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The dependency edge already exists.
    #[error("dependency {dependent} -> {blocker} already exists")]
    DuplicateDependency {
        /// Waiting task.
        dependent: TaskId,
        /// Blocking task.
        blocker: TaskId,
    },

    /// A task in the batch belongs to another project.
    #[error("task {task_id} does not belong to project {project_id}")]
    ProjectMismatch {
        /// Offending task.
        task_id: TaskId,
        /// Project of the batch.
        project_id: ProjectId,
    },

    /// The ledger rejected the history batch.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ScheduleRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
