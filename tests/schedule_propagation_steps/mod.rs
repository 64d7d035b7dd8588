//! Step definitions for schedule propagation BDD scenarios.

pub mod world;

mod given;
mod then;
mod when;
