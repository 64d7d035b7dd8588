//! Shared test helpers for in-memory schedule integration tests.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mockable::DefaultClock;
use planwright::schedule::{
    adapters::memory::InMemoryScheduleStore,
    domain::{ProjectId, ScheduleConfig, ScheduledTask},
    ports::TaskGraphRepository,
    services::SchedulePropagationService,
};
use rstest::fixture;

/// Service type used by the integration tests.
pub type TestService = SchedulePropagationService<InMemoryScheduleStore, DefaultClock>;

/// A store, a service over it and a fresh project.
pub struct Fixture {
    /// Shared store, also read directly by assertions.
    pub store: Arc<InMemoryScheduleStore>,
    /// Service under test.
    pub service: TestService,
    /// Project every helper-created task belongs to.
    pub project: ProjectId,
}

impl Fixture {
    /// Builds a fixture with the given engine configuration.
    #[must_use]
    pub fn with_config(config: ScheduleConfig) -> Self {
        let store = Arc::new(InMemoryScheduleStore::new());
        let service = SchedulePropagationService::with_config(
            Arc::clone(&store),
            Arc::new(DefaultClock),
            config,
        );
        Self {
            store,
            service,
            project: ProjectId::new(),
        }
    }

    /// Stores a `todo` task planned over `[start, end]` days.
    ///
    /// # Errors
    ///
    /// Returns an error when the dates are inverted or the store rejects the
    /// task.
    pub async fn planned(&self, start: i64, end: i64) -> eyre::Result<ScheduledTask> {
        let task = ScheduledTask::planned(self.project, day(start), day(end))?;
        self.store.store_task(&task).await?;
        Ok(task)
    }

    /// Stores a `doing` task planned over `[start, end]` days that started on
    /// day `started_on`.
    ///
    /// # Errors
    ///
    /// Returns an error when the dates are inverted or the store rejects the
    /// task.
    pub async fn started(
        &self,
        start: i64,
        end: i64,
        started_on: i64,
    ) -> eyre::Result<ScheduledTask> {
        let mut task = ScheduledTask::planned(self.project, day(start), day(end))?;
        task.start(day(started_on))?;
        self.store.store_task(&task).await?;
        Ok(task)
    }

    /// Reloads a task from the store.
    ///
    /// # Errors
    ///
    /// Returns an error when the task is missing.
    pub async fn reload(&self, task: &ScheduledTask) -> eyre::Result<ScheduledTask> {
        self.store
            .find_task(task.id())
            .await?
            .ok_or_else(|| eyre::eyre!("task {} missing from store", task.id()))
    }
}

/// Provides a fixture with the default configuration.
#[fixture]
pub fn fixture() -> Fixture {
    Fixture::with_config(ScheduleConfig::default())
}

/// Midnight UTC `offset` days after the test epoch.
#[must_use]
pub fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0)
        .single()
        .map(|epoch| epoch + TimeDelta::days(offset))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
