//! Domain model and pure engine for schedule propagation.
//!
//! Nothing in this module performs I/O. The engine reads a
//! [`ScheduleSnapshot`] and returns a [`PropagationPlan`]; persisting the
//! plan, and emitting notifications for it, belongs to the caller.

mod chain;
mod config;
mod cycle;
mod dependency;
mod error;
mod history;
mod ids;
mod ledger;
mod propagation;
mod resolver;
mod task;
mod topology;

pub use chain::{CausalChain, CausalLink, format_shift};
pub use config::ScheduleConfig;
pub use cycle::{validate_new_edge, would_create_cycle};
pub use dependency::{DependencyEdge, DependencyGraph};
pub use error::{
    ActualDateField, ParseScheduleChangeReasonError, ParseTaskStatusError, ResolverDataError,
    ScheduleDomainError, ScheduleEngineError,
};
pub use history::{ScheduleChange, ScheduleChangeReason, ScheduleHistoryEntry};
pub use ids::{HistoryEntryId, ProjectId, TaskId, UserId};
pub use ledger::{LedgerDigest, LedgerError, LedgerRecord, ScheduleLedger};
pub use propagation::{
    PropagationPlan, RootChange, ScheduleChanged, ScheduleSnapshot, ScheduleUpdate, SkipCause,
    SkippedTask, detect_delay, propagate,
};
pub use resolver::{PredecessorFinish, Resolution, resolve};
pub use task::{PersistedTaskData, ScheduledTask, TaskStatus};
pub use topology::topological_order;
