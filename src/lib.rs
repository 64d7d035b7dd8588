//! Planwright: dependency-aware schedule propagation.
//!
//! This crate keeps the planned dates of a project's tasks consistent with
//! the finish-to-start dependencies between them. When a task completes,
//! is cancelled, or is rescheduled by hand, every transitively dependent
//! task is shifted in one deterministic pass and each shift is recorded in
//! an append-only history ledger that can explain the chain of causes.
//!
//! # Architecture
//!
//! Planwright follows hexagonal architecture principles:
//!
//! - **Domain**: Pure scheduling logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for the task graph and history
//! - **Adapters**: Concrete implementations of ports (in-memory store)
//! - **Services**: Orchestration under per-project serialization
//!
//! # Modules
//!
//! - [`schedule`]: Dependency validation, date propagation and history

pub mod schedule;
