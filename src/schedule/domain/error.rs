//! Error types for the schedule domain and its engine.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain schedule values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleDomainError {
    /// A task cannot depend on itself.
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    /// The requested status change is not permitted by the task workflow.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// An actual date is a recorded fact and cannot be written twice.
    #[error("actual {field} of task {task_id} is already recorded")]
    ActualDateAlreadySet {
        /// Task that already carries the fact.
        task_id: TaskId,
        /// Which actual date was already set.
        field: ActualDateField,
    },

    /// A persisted task records an actual end without being finished.
    #[error("task {task_id} has an actual end date but status {status}")]
    ActualEndWithoutFinish {
        /// Offending task.
        task_id: TaskId,
        /// Its persisted status.
        status: TaskStatus,
    },

    /// Planned dates are inverted.
    #[error("task {0} is planned to end before it starts")]
    InvertedPlannedDates(TaskId),

    /// Frozen tasks do not accept new planning dates.
    #[error("task {task_id} is {status} and its schedule is frozen")]
    ScheduleFrozen {
        /// Frozen task.
        task_id: TaskId,
        /// Its frozen status.
        status: TaskStatus,
    },
}

/// Names an actual (fact) date on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActualDateField {
    /// The actual start date.
    Start,
    /// The actual end date.
    End,
}

impl std::fmt::Display for ActualDateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Malformed planning data found while resolving a single task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverDataError {
    /// A not-started task lacks the planned dates needed to shift it.
    #[error("task {0} has no planned start and end to shift")]
    MissingPlannedDates(TaskId),

    /// A started task lacks the expected end needed to re-predict it.
    #[error("task {0} has started but has no expected end")]
    MissingExpectedEnd(TaskId),

    /// The planned duration is negative.
    #[error("task {0} has a negative planned duration")]
    NegativeDuration(TaskId),

    /// Shifting the task overflowed the representable date range.
    #[error("shifting task {0} overflows the date range")]
    DateOverflow(TaskId),
}

impl ResolverDataError {
    /// Returns the task the error refers to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::MissingPlannedDates(id)
            | Self::MissingExpectedEnd(id)
            | Self::NegativeDuration(id)
            | Self::DateOverflow(id) => *id,
        }
    }
}

/// Engine-level failures of cycle validation, ordering and propagation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleEngineError {
    /// Inserting the edge would close a dependency cycle.
    #[error("dependency {dependent} -> {blocker} would create a cycle")]
    CycleDetected {
        /// Task that would depend on `blocker`.
        dependent: TaskId,
        /// Task that would block `dependent`.
        blocker: TaskId,
    },

    /// Topological ordering found tasks with unresolved in-degree.
    #[error("schedule invariant violated: {} task(s) form a dependency cycle", unresolved.len())]
    ScheduleInvariantViolation {
        /// Tasks left with nonzero in-degree, in id order.
        unresolved: Vec<TaskId>,
    },

    /// A task could not be resolved and resolver errors are fatal.
    #[error(transparent)]
    ResolverData(#[from] ResolverDataError),

    /// Causal chain reconstruction revisited a task.
    #[error("causal chain loops back to task {0}")]
    ChainReconstructionCycle(TaskId),

    /// Causal chain reconstruction exceeded the configured depth.
    #[error("causal chain exceeds depth {depth} at task {task_id}")]
    ChainDepthExceeded {
        /// Task at which reconstruction stopped.
        task_id: TaskId,
        /// Configured depth bound.
        depth: usize,
    },

    /// A root change refers to a task absent from the snapshot.
    #[error("unknown task in root change: {0}")]
    UnknownTask(TaskId),

    /// The same task was supplied as a root more than once.
    #[error("task {0} appears in more than one root change")]
    DuplicateRootChange(TaskId),
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing schedule change reasons from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown schedule change reason: {0}")]
pub struct ParseScheduleChangeReasonError(pub String);
