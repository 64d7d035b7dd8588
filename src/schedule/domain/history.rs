//! Immutable schedule history entries.

use super::{HistoryEntryId, ParseScheduleChangeReasonError, TaskId, UserId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a task's planned dates moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleChangeReason {
    /// A blocker finished, or is predicted to finish, later.
    DependencyDelay,
    /// A blocker finished, or is predicted to finish, earlier.
    DependencyEarly,
    /// A user replaced the dates by hand.
    ManualOverride,
    /// The task itself was completed.
    TaskCompleted,
    /// The task itself was cancelled.
    TaskCancelled,
}

impl ScheduleChangeReason {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DependencyDelay => "dependency_delay",
            Self::DependencyEarly => "dependency_early",
            Self::ManualOverride => "manual_override",
            Self::TaskCompleted => "task_completed",
            Self::TaskCancelled => "task_cancelled",
        }
    }

    /// Returns `true` for reasons produced by propagation rather than by a
    /// change to the task itself.
    #[must_use]
    pub const fn is_propagated(self) -> bool {
        matches!(self, Self::DependencyDelay | Self::DependencyEarly)
    }
}

impl fmt::Display for ScheduleChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ScheduleChangeReason {
    type Error = ParseScheduleChangeReasonError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "dependency_delay" => Ok(Self::DependencyDelay),
            "dependency_early" => Ok(Self::DependencyEarly),
            "manual_override" => Ok(Self::ManualOverride),
            "task_completed" => Ok(Self::TaskCompleted),
            "task_cancelled" => Ok(Self::TaskCancelled),
            _ => Err(ParseScheduleChangeReasonError(value.to_owned())),
        }
    }
}

/// Parameter object describing one date mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChange {
    /// Task whose dates moved.
    pub task_id: TaskId,
    /// Planned start before the change.
    pub old_expected_start: Option<DateTime<Utc>>,
    /// Planned end before the change.
    pub old_expected_end: Option<DateTime<Utc>>,
    /// Planned start after the change.
    pub new_expected_start: Option<DateTime<Utc>>,
    /// Planned end after the change.
    pub new_expected_end: Option<DateTime<Utc>>,
    /// Why the dates moved.
    pub reason: ScheduleChangeReason,
    /// Task whose change caused this one, if any.
    pub causing_task_id: Option<TaskId>,
    /// User who triggered the change, if any.
    pub changed_by: Option<UserId>,
}

/// Immutable record of a date mutation.
///
/// Entries expose no mutators; ordering by `created_at` yields the causal
/// timeline of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleHistoryEntry {
    id: HistoryEntryId,
    task_id: TaskId,
    old_expected_start: Option<DateTime<Utc>>,
    old_expected_end: Option<DateTime<Utc>>,
    new_expected_start: Option<DateTime<Utc>>,
    new_expected_end: Option<DateTime<Utc>>,
    reason: ScheduleChangeReason,
    causing_task_id: Option<TaskId>,
    changed_by: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl ScheduleHistoryEntry {
    /// Creates an entry for `change`, stamped at `created_at`.
    #[must_use]
    pub fn new(change: ScheduleChange, created_at: DateTime<Utc>) -> Self {
        Self {
            id: HistoryEntryId::new(),
            task_id: change.task_id,
            old_expected_start: change.old_expected_start,
            old_expected_end: change.old_expected_end,
            new_expected_start: change.new_expected_start,
            new_expected_end: change.new_expected_end,
            reason: change.reason,
            causing_task_id: change.causing_task_id,
            changed_by: change.changed_by,
            created_at,
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> HistoryEntryId {
        self.id
    }

    /// Returns the task whose dates moved.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the planned start before the change.
    #[must_use]
    pub const fn old_expected_start(&self) -> Option<DateTime<Utc>> {
        self.old_expected_start
    }

    /// Returns the planned end before the change.
    #[must_use]
    pub const fn old_expected_end(&self) -> Option<DateTime<Utc>> {
        self.old_expected_end
    }

    /// Returns the planned start after the change.
    #[must_use]
    pub const fn new_expected_start(&self) -> Option<DateTime<Utc>> {
        self.new_expected_start
    }

    /// Returns the planned end after the change.
    #[must_use]
    pub const fn new_expected_end(&self) -> Option<DateTime<Utc>> {
        self.new_expected_end
    }

    /// Returns why the dates moved.
    #[must_use]
    pub const fn reason(&self) -> ScheduleChangeReason {
        self.reason
    }

    /// Returns the task whose change caused this one.
    #[must_use]
    pub const fn causing_task_id(&self) -> Option<TaskId> {
        self.causing_task_id
    }

    /// Returns the user who triggered the change.
    #[must_use]
    pub const fn changed_by(&self) -> Option<UserId> {
        self.changed_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Signed movement of the planned end, when both ends are known.
    #[must_use]
    pub fn end_shift(&self) -> Option<TimeDelta> {
        Some(self.new_expected_end? - self.old_expected_end?)
    }

    /// Signed movement of the planned start, when both starts are known.
    #[must_use]
    pub fn start_shift(&self) -> Option<TimeDelta> {
        Some(self.new_expected_start? - self.old_expected_start?)
    }
}
