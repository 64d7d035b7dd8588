//! Schedule propagation for dependent tasks.
//!
//! This module keeps planning dates consistent across a project's dependency
//! DAG: it rejects edges that would close a cycle, cascades date shifts to
//! every transitively dependent task in one deterministic pass, and records
//! each shift in an append-only, digest-chained ledger that can explain why a
//! task moved. The module follows hexagonal architecture:
//!
//! - Domain types and the pure engine in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
