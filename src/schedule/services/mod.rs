//! Application services for schedule propagation.

mod propagation;

pub use propagation::{
    AddDependencyRequest, CompleteTaskRequest, OverrideScheduleRequest, PropagationOutcome,
    SchedulePropagationService, ScheduleServiceError, ScheduleServiceResult,
};
