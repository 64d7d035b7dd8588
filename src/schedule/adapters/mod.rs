//! Adapter implementations of the schedule ports.

pub mod memory;
