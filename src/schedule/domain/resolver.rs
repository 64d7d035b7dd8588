//! Lifecycle-aware resolution of a single task's planned dates.

use super::{ResolverDataError, ScheduleConfig, ScheduledTask, TaskId};
use chrono::{DateTime, TimeDelta, Utc};

/// A direct blocker's finish as seen during one propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredecessorFinish {
    /// The blocker.
    pub task_id: TaskId,
    /// Its finish before this pass.
    pub previous_finish: DateTime<Utc>,
    /// Its finish after the part of the pass already resolved.
    pub finish: DateTime<Utc>,
}

impl PredecessorFinish {
    /// A blocker whose finish did not move.
    #[must_use]
    pub const fn unchanged(task_id: TaskId, finish: DateTime<Utc>) -> Self {
        Self {
            task_id,
            previous_finish: finish,
            finish,
        }
    }

    /// How far the finish moved in this pass.
    #[must_use]
    pub fn shift(&self) -> TimeDelta {
        self.finish - self.previous_finish
    }
}

/// Planned dates of a task before and after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved task.
    pub task_id: TaskId,
    /// Planned start before resolution.
    pub old_start: Option<DateTime<Utc>>,
    /// Planned end before resolution.
    pub old_end: Option<DateTime<Utc>>,
    /// Planned start after resolution.
    pub new_start: Option<DateTime<Utc>>,
    /// Planned end after resolution.
    pub new_end: Option<DateTime<Utc>>,
    /// The predecessor whose finish forced the change, if any.
    pub binding_predecessor: Option<TaskId>,
}

impl Resolution {
    fn unchanged(task: &ScheduledTask) -> Self {
        Self {
            task_id: task.id(),
            old_start: task.expected_start(),
            old_end: task.expected_end(),
            new_start: task.expected_start(),
            new_end: task.expected_end(),
            binding_predecessor: None,
        }
    }

    /// Returns `true` when either planned date moved.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.old_start != self.new_start || self.old_end != self.new_end
    }

    /// Signed movement of the planned end, when both ends are known.
    #[must_use]
    pub fn end_shift(&self) -> Option<TimeDelta> {
        Some(self.new_end? - self.old_end?)
    }
}

/// Computes a task's planned dates under its predecessors' finishes.
///
/// - Done or cancelled tasks keep their dates.
/// - Started tasks keep their start; the end moves by the largest shift any
///   predecessor underwent in this pass, but never before the later of the
///   actual and planned start.
/// - Other tasks start no earlier than their current plan and no earlier than
///   the latest predecessor finish plus the configured lag, and keep their
///   planned duration.
///
/// Predecessors with unknown finish must be left out of `predecessors`.
///
/// # Errors
///
/// Returns a [`ResolverDataError`] when the dates needed for the applicable
/// rule are missing or malformed.
pub fn resolve(
    task: &ScheduledTask,
    predecessors: &[PredecessorFinish],
    config: &ScheduleConfig,
) -> Result<Resolution, ResolverDataError> {
    if task.status().is_frozen() {
        return Ok(Resolution::unchanged(task));
    }
    if task.has_started() {
        resolve_started(task, predecessors)
    } else {
        resolve_not_started(task, predecessors, config.finish_to_start_lag())
    }
}

fn resolve_started(
    task: &ScheduledTask,
    predecessors: &[PredecessorFinish],
) -> Result<Resolution, ResolverDataError> {
    let unchanged = Resolution::unchanged(task);
    let Some(binding) = binding_by(predecessors, PredecessorFinish::shift) else {
        return Ok(unchanged);
    };
    let delta = binding.shift();
    if delta.is_zero() {
        return Ok(unchanged);
    }

    let expected_end = task
        .expected_end()
        .ok_or(ResolverDataError::MissingExpectedEnd(task.id()))?;
    let shifted = expected_end
        .checked_add_signed(delta)
        .ok_or(ResolverDataError::DateOverflow(task.id()))?;
    // An early blocker never pulls the end before the task's own start.
    let floor = task
        .actual_start()
        .max(task.expected_start())
        .map_or(shifted, |start| start.min(expected_end));
    let new_end = shifted.max(floor);
    if new_end == expected_end {
        return Ok(unchanged);
    }

    Ok(Resolution {
        new_end: Some(new_end),
        binding_predecessor: Some(binding.task_id),
        ..unchanged
    })
}

fn resolve_not_started(
    task: &ScheduledTask,
    predecessors: &[PredecessorFinish],
    lag: TimeDelta,
) -> Result<Resolution, ResolverDataError> {
    let unchanged = Resolution::unchanged(task);
    let Some(binding) = binding_by(predecessors, |predecessor| predecessor.finish) else {
        return Ok(unchanged);
    };

    let (Some(start), Some(end)) = (task.expected_start(), task.expected_end()) else {
        return Err(ResolverDataError::MissingPlannedDates(task.id()));
    };
    let duration = end - start;
    if duration < TimeDelta::zero() {
        return Err(ResolverDataError::NegativeDuration(task.id()));
    }

    let earliest_start = binding
        .finish
        .checked_add_signed(lag)
        .ok_or(ResolverDataError::DateOverflow(task.id()))?;
    if earliest_start <= start {
        return Ok(unchanged);
    }
    let new_end = earliest_start
        .checked_add_signed(duration)
        .ok_or(ResolverDataError::DateOverflow(task.id()))?;

    Ok(Resolution {
        new_start: Some(earliest_start),
        new_end: Some(new_end),
        binding_predecessor: Some(binding.task_id),
        ..unchanged
    })
}

/// Picks the predecessor maximising `key`; ties go to the smallest id.
fn binding_by<K: Ord>(
    predecessors: &[PredecessorFinish],
    key: impl Fn(&PredecessorFinish) -> K,
) -> Option<&PredecessorFinish> {
    predecessors.iter().max_by(|left, right| {
        key(left)
            .cmp(&key(right))
            .then_with(|| right.task_id.cmp(&left.task_id))
    })
}
