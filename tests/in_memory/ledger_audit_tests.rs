//! In-memory integration tests for the schedule history audit trail.

use super::helpers::{Fixture, day, fixture};
use eyre::ensure;
use planwright::schedule::{
    domain::UserId,
    ports::ScheduleHistoryRepository,
    services::{AddDependencyRequest, CompleteTaskRequest, OverrideScheduleRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ledger_stays_verifiable_across_many_propagations(fixture: Fixture) -> eyre::Result<()> {
    let a = fixture.planned(0, 1).await?;
    let b = fixture.planned(2, 3).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(b.id(), a.id()))
        .await?;

    for end in 2..6 {
        fixture
            .service
            .override_schedule(OverrideScheduleRequest::new(a.id(), day(0), day(end)))
            .await?;
    }

    let ledger = fixture.store.load_ledger(fixture.project).await?;
    ledger.verify()?;
    ensure!(ledger.len() == 8, "unexpected ledger length {}", ledger.len());
    let timeline: Vec<_> = ledger
        .records()
        .iter()
        .map(|record| record.entry().created_at())
        .collect();
    ensure!(timeline.windows(2).all(|pair| matches!(pair, [earlier, later] if earlier <= later)));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acting_user_is_recorded_on_root_entries(fixture: Fixture) -> eyre::Result<()> {
    let task = fixture.started(0, 1, 0).await?;
    let user = UserId::new();

    let outcome = fixture
        .service
        .complete_task(
            CompleteTaskRequest::new(task.id())
                .with_actual_end(day(2))
                .with_changed_by(user),
        )
        .await?;

    let history = fixture.service.history(task.id()).await?;
    ensure!(history.len() == 1);
    ensure!(history.iter().all(|entry| entry.changed_by() == Some(user)));
    ensure!(outcome.notifications().len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delay_chain_renders_a_readable_explanation(fixture: Fixture) -> eyre::Result<()> {
    let a = fixture.planned(0, 1).await?;
    let b = fixture.planned(2, 3).await?;
    let c = fixture.planned(4, 5).await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(b.id(), a.id()))
        .await?;
    fixture
        .service
        .add_dependency(AddDependencyRequest::new(c.id(), b.id()))
        .await?;
    fixture
        .service
        .override_schedule(OverrideScheduleRequest::new(a.id(), day(0), day(3)))
        .await?;

    let chain = fixture.service.delay_chain(c.id()).await?;
    let rendered = chain.to_string();

    ensure!(chain.is_complete());
    ensure!(chain.root_cause() == Some(a.id()));
    ensure!(rendered.contains("manual_override (+2d)"), "rendered:\n{rendered}");
    ensure!(rendered.contains(&format!("shifted by task {}", b.id())));
    Ok(())
}
