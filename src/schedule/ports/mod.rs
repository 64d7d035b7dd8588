//! Port contracts for schedule propagation.
//!
//! Ports define infrastructure-agnostic interfaces used by the propagation
//! service: the task graph store and the schedule history store.

pub mod repository;

pub use repository::{
    ScheduleCommit, ScheduleHistoryRepository, ScheduleRepositoryError, ScheduleRepositoryResult,
    TaskGraphRepository,
};
