//! Scheduled task aggregate and its lifecycle status.

use super::{
    ActualDateField, ParseTaskStatusError, ProjectId, ScheduleDomainError, ScheduleUpdate,
    TaskId,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// `Done` and `Cancelled` freeze the task's schedule: propagation walks
/// through such tasks but never changes their dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been created but work has not started.
    Todo,
    /// Task is waiting on an unfinished blocker.
    Blocked,
    /// Task is being worked on.
    Doing,
    /// Task has been completed.
    Done,
    /// Task has been cancelled.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Blocked => "blocked",
            Self::Doing => "doing",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` when the task's dates may no longer be propagated.
    #[must_use]
    pub const fn is_frozen(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Returns `true` when no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.is_frozen()
    }

    /// Returns whether the workflow allows moving from `self` to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Todo, Self::Doing | Self::Blocked | Self::Cancelled)
                | (Self::Blocked, Self::Todo | Self::Cancelled)
                | (Self::Doing, Self::Done | Self::Blocked | Self::Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Ok(Self::Todo),
            "blocked" => Ok(Self::Blocked),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// A task as seen by the schedule engine.
///
/// Expected dates are the mutable plan. Actual dates are write-once facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    id: TaskId,
    project_id: ProjectId,
    expected_start: Option<DateTime<Utc>>,
    expected_end: Option<DateTime<Utc>>,
    actual_start: Option<DateTime<Utc>>,
    actual_end: Option<DateTime<Utc>>,
    status: TaskStatus,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Planned start.
    pub expected_start: Option<DateTime<Utc>>,
    /// Planned end.
    pub expected_end: Option<DateTime<Utc>>,
    /// Recorded start.
    pub actual_start: Option<DateTime<Utc>>,
    /// Recorded end.
    pub actual_end: Option<DateTime<Utc>>,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
}

impl ScheduledTask {
    /// Creates a `todo` task without planning dates.
    #[must_use]
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            id: TaskId::new(),
            project_id,
            expected_start: None,
            expected_end: None,
            actual_start: None,
            actual_end: None,
            status: TaskStatus::Todo,
        }
    }

    /// Creates a `todo` task planned over `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::InvertedPlannedDates`] when `end`
    /// precedes `start`.
    pub fn planned(
        project_id: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ScheduleDomainError> {
        let mut task = Self::new(project_id);
        if end < start {
            return Err(ScheduleDomainError::InvertedPlannedDates(task.id));
        }
        task.expected_start = Some(start);
        task.expected_end = Some(end);
        Ok(task)
    }

    /// Reconstructs a task from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ActualEndWithoutFinish`] when the data
    /// records an actual end on a task that is neither done nor cancelled.
    pub fn from_persisted(data: PersistedTaskData) -> Result<Self, ScheduleDomainError> {
        if data.actual_end.is_some() && !data.status.is_frozen() {
            return Err(ScheduleDomainError::ActualEndWithoutFinish {
                task_id: data.id,
                status: data.status,
            });
        }
        Ok(Self {
            id: data.id,
            project_id: data.project_id,
            expected_start: data.expected_start,
            expected_end: data.expected_end,
            actual_start: data.actual_start,
            actual_end: data.actual_end,
            status: data.status,
        })
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the planned start.
    #[must_use]
    pub const fn expected_start(&self) -> Option<DateTime<Utc>> {
        self.expected_start
    }

    /// Returns the planned end.
    #[must_use]
    pub const fn expected_end(&self) -> Option<DateTime<Utc>> {
        self.expected_end
    }

    /// Returns the recorded start.
    #[must_use]
    pub const fn actual_start(&self) -> Option<DateTime<Utc>> {
        self.actual_start
    }

    /// Returns the recorded end.
    #[must_use]
    pub const fn actual_end(&self) -> Option<DateTime<Utc>> {
        self.actual_end
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns `true` once work has really begun.
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.actual_start.is_some()
    }

    /// Planned duration, when both planned dates are known.
    #[must_use]
    pub fn planned_duration(&self) -> Option<TimeDelta> {
        Some(self.expected_end? - self.expected_start?)
    }

    /// The finish date dependents are constrained by: the recorded end when
    /// known, the planned end otherwise.
    #[must_use]
    pub fn effective_finish(&self) -> Option<DateTime<Utc>> {
        self.actual_end.or(self.expected_end)
    }

    /// Returns `true` when the task finished later than planned.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        matches!(
            (self.actual_end, self.expected_end),
            (Some(actual), Some(expected)) if actual > expected
        )
    }

    /// Moves the task to `target` when the workflow permits it.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::InvalidStatusTransition`] otherwise.
    pub fn transition_to(&mut self, target: TaskStatus) -> Result<(), ScheduleDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(ScheduleDomainError::InvalidStatusTransition {
                task_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }

    /// Starts work, recording the actual start.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ActualDateAlreadySet`] when the task has
    /// already started, or a transition error when it cannot move to `doing`.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), ScheduleDomainError> {
        self.ensure_unset(self.actual_start, ActualDateField::Start)?;
        self.transition_to(TaskStatus::Doing)?;
        self.actual_start = Some(at);
        Ok(())
    }

    /// Completes the task, recording the actual end.
    ///
    /// A task that never recorded its start is taken to have started at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ActualDateAlreadySet`] or a transition
    /// error when the task cannot be completed.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), ScheduleDomainError> {
        self.finish(TaskStatus::Done, at)?;
        if self.actual_start.is_none() {
            self.actual_start = Some(at);
        }
        Ok(())
    }

    /// Cancels the task, recording the actual end.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ActualDateAlreadySet`] or a transition
    /// error when the task cannot be cancelled.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), ScheduleDomainError> {
        self.finish(TaskStatus::Cancelled, at)
    }

    /// Blocks the task while a blocker is unfinished.
    ///
    /// # Errors
    ///
    /// Returns a transition error when the current status cannot be blocked.
    pub fn block(&mut self) -> Result<(), ScheduleDomainError> {
        self.transition_to(TaskStatus::Blocked)
    }

    /// Returns a blocked task to `todo`.
    ///
    /// # Errors
    ///
    /// Returns a transition error when the task is not blocked.
    pub fn unblock(&mut self) -> Result<(), ScheduleDomainError> {
        self.transition_to(TaskStatus::Todo)
    }

    /// Replaces the planned dates by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleDomainError::ScheduleFrozen`] for done or cancelled
    /// tasks and [`ScheduleDomainError::InvertedPlannedDates`] when `end`
    /// precedes `start`.
    pub fn reschedule(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(), ScheduleDomainError> {
        if self.status.is_frozen() {
            return Err(ScheduleDomainError::ScheduleFrozen {
                task_id: self.id,
                status: self.status,
            });
        }
        let inverted = matches!(
            (start, end),
            (Some(planned_start), Some(planned_end)) if planned_end < planned_start
        );
        if inverted {
            return Err(ScheduleDomainError::InvertedPlannedDates(self.id));
        }
        self.expected_start = start;
        self.expected_end = end;
        Ok(())
    }

    /// Applies dates computed by the propagation engine.
    ///
    /// Updates for other tasks are ignored.
    pub fn apply_update(&mut self, update: &ScheduleUpdate) {
        if update.task_id != self.id {
            return;
        }
        self.expected_start = update.new_start;
        self.expected_end = update.new_end;
    }

    fn finish(&mut self, target: TaskStatus, at: DateTime<Utc>) -> Result<(), ScheduleDomainError> {
        self.ensure_unset(self.actual_end, ActualDateField::End)?;
        self.transition_to(target)?;
        self.actual_end = Some(at);
        Ok(())
    }

    fn ensure_unset(
        &self,
        value: Option<DateTime<Utc>>,
        field: ActualDateField,
    ) -> Result<(), ScheduleDomainError> {
        if value.is_some() {
            return Err(ScheduleDomainError::ActualDateAlreadySet {
                task_id: self.id,
                field,
            });
        }
        Ok(())
    }
}
