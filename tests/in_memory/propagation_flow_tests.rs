//! In-memory integration tests for end-to-end schedule propagation.

use super::helpers::{Fixture, day, fixture};
use chrono::TimeDelta;
use eyre::{bail, ensure};
use planwright::schedule::{
    domain::{ScheduleChangeReason, ScheduleConfig, ScheduledTask, SkipCause},
    ports::TaskGraphRepository,
    services::{AddDependencyRequest, CompleteTaskRequest, OverrideScheduleRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn long_chain_shifts_every_task_once(fixture: Fixture) -> eyre::Result<()> {
    let mut chain = Vec::new();
    for index in 0..6_i64 {
        chain.push(fixture.planned(index * 2, index * 2 + 1).await?);
    }
    for pair in chain.windows(2) {
        let [blocker, dependent] = pair else {
            bail!("windows(2) yields pairs");
        };
        fixture
            .service
            .add_dependency(AddDependencyRequest::new(dependent.id(), blocker.id()))
            .await?;
    }
    let Some(head) = chain.first() else {
        bail!("chain is empty");
    };

    let outcome = fixture
        .service
        .override_schedule(OverrideScheduleRequest::new(head.id(), day(0), day(3)))
        .await?;

    ensure!(outcome.plan.entries.len() == chain.len());
    for task in chain.iter().skip(1) {
        let entries = fixture.service.history(task.id()).await?;
        ensure!(entries.len() == 1, "task moved {} times", entries.len());
        let before = task.expected_start();
        let after = fixture.reload(task).await?.expected_start();
        ensure!(
            after.zip(before).map(|(moved, planned)| moved - planned) == Some(TimeDelta::days(2)),
            "unexpected shift from {before:?} to {after:?}"
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn early_completion_pulls_in_running_dependents(fixture: Fixture) -> eyre::Result<()> {
    let blocker = fixture.started(0, 4, 0).await?;
    let running = fixture.started(1, 6, 1).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(running.id(), blocker.id()))
        .await?;

    fixture
        .service
        .complete_task(CompleteTaskRequest::new(blocker.id()).with_actual_end(day(2)))
        .await?;

    let history = fixture.service.history(running.id()).await?;
    let [entry] = history.as_slice() else {
        bail!("expected one entry, got {}", history.len());
    };
    ensure!(entry.reason() == ScheduleChangeReason::DependencyEarly);
    ensure!(fixture.reload(&running).await?.expected_end() == Some(day(4)));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn large_early_finish_stops_at_the_running_task_start(
    fixture: Fixture,
) -> eyre::Result<()> {
    let blocker = fixture.started(0, 12, 0).await?;
    let running = fixture.started(1, 5, 1).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(running.id(), blocker.id()))
        .await?;

    fixture
        .service
        .complete_task(CompleteTaskRequest::new(blocker.id()).with_actual_end(day(2)))
        .await?;

    let reloaded = fixture.reload(&running).await?;
    ensure!(reloaded.expected_start() == Some(day(1)));
    ensure!(reloaded.expected_end() == Some(day(1)));
    ensure!(reloaded.planned_duration() == Some(TimeDelta::zero()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undated_task_is_skipped_with_its_subtree(fixture: Fixture) -> eyre::Result<()> {
    let root = fixture.planned(0, 1).await?;
    let undated = ScheduledTask::new(fixture.project);
    fixture.store.store_task(&undated).await?;
    let after = fixture.planned(2, 3).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(undated.id(), root.id()))
        .await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(after.id(), undated.id()))
        .await?;

    let outcome = fixture
        .service
        .override_schedule(OverrideScheduleRequest::new(root.id(), day(0), day(5)))
        .await?;

    ensure!(outcome.plan.skipped.len() == 2);
    let upstream = SkipCause::UpstreamSkipped(undated.id());
    ensure!(
        outcome
            .plan
            .skipped
            .iter()
            .any(|skip| skip.task_id == after.id() && skip.cause == upstream)
    );
    ensure!(fixture.reload(&after).await?.expected_start() == Some(day(2)));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn strict_service_commits_nothing_on_bad_data() -> eyre::Result<()> {
    let fixture = Fixture::with_config(ScheduleConfig::strict());
    let root = fixture.planned(0, 1).await?;
    let undated = ScheduledTask::new(fixture.project);
    fixture.store.store_task(&undated).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(undated.id(), root.id()))
        .await?;

    let result = fixture
        .service
        .override_schedule(OverrideScheduleRequest::new(root.id(), day(0), day(5)))
        .await;

    ensure!(result.is_err());
    ensure!(fixture.reload(&root).await?.expected_end() == Some(day(1)));
    ensure!(fixture.service.history(root.id()).await?.is_empty());
    Ok(())
}
