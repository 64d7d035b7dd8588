//! Shared world state for schedule propagation BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mockable::DefaultClock;
use planwright::schedule::{
    adapters::memory::InMemoryScheduleStore,
    domain::{DependencyEdge, ProjectId, TaskId},
    services::{SchedulePropagationService, ScheduleServiceError},
};
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestScheduleService = SchedulePropagationService<InMemoryScheduleStore, DefaultClock>;

/// Scenario world for schedule propagation behaviour tests.
pub struct ScheduleWorld {
    pub store: Arc<InMemoryScheduleStore>,
    pub service: TestScheduleService,
    pub project: ProjectId,
    pub tasks: HashMap<String, TaskId>,
    pub last_dependency_result: Option<Result<DependencyEdge, ScheduleServiceError>>,
}

impl ScheduleWorld {
    /// Creates a world with an empty project.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryScheduleStore::new());
        let service = SchedulePropagationService::new(Arc::clone(&store), Arc::new(DefaultClock));

        Self {
            store,
            service,
            project: ProjectId::new(),
            tasks: HashMap::new(),
            last_dependency_result: None,
        }
    }

    /// Looks up a task created earlier in the scenario by name.
    ///
    /// # Errors
    ///
    /// Returns an error when no task with that name exists.
    pub fn task_id(&self, name: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("no task named {name} in scenario world"))
    }
}

impl Default for ScheduleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ScheduleWorld {
    ScheduleWorld::default()
}

/// Midnight UTC `offset` days after the scenario epoch.
///
/// # Errors
///
/// Returns an error when the epoch cannot be built.
pub fn day(offset: u32) -> Result<DateTime<Utc>, eyre::Report> {
    let epoch = Utc
        .with_ymd_and_hms(2026, 3, 2, 0, 0, 0)
        .single()
        .ok_or_else(|| eyre::eyre!("invalid scenario epoch"))?;
    Ok(epoch + TimeDelta::days(i64::from(offset)))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
