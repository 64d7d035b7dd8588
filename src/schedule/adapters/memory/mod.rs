//! In-memory adapters for schedule propagation tests and embedding.

mod store;

pub use store::InMemoryScheduleStore;
