//! Then steps for schedule propagation BDD scenarios.

use super::world::{ScheduleWorld, day, run_async};
use planwright::schedule::{
    domain::{ScheduleChangeReason, ScheduleEngineError},
    ports::TaskGraphRepository,
    services::ScheduleServiceError,
};
use rstest_bdd_macros::then;

#[then(r#""{name}" is planned from day {start:u32} to day {end:u32}"#)]
fn task_is_planned(
    world: &ScheduleWorld,
    name: String,
    start: u32,
    end: u32,
) -> Result<(), eyre::Report> {
    let task = run_async(world.store.find_task(world.task_id(&name)?))?
        .ok_or_else(|| eyre::eyre!("task {name} missing from store"))?;
    let expected = (Some(day(start)?), Some(day(end)?));
    let actual = (task.expected_start(), task.expected_end());
    if actual != expected {
        return Err(eyre::eyre!(
            "expected {name} planned {expected:?}, found {actual:?}"
        ));
    }
    Ok(())
}

#[then(r#""{name}" has {count:usize} history entry caused by "{cause}""#)]
fn history_caused_by(
    world: &ScheduleWorld,
    name: String,
    count: usize,
    cause: String,
) -> Result<(), eyre::Report> {
    let cause_id = world.task_id(&cause)?;
    let history = run_async(world.service.history(world.task_id(&name)?))?;
    if history.len() != count {
        return Err(eyre::eyre!(
            "expected {count} history entries for {name}, found {}",
            history.len()
        ));
    }
    let unexplained = history.iter().find(|entry| {
        entry.causing_task_id() != Some(cause_id)
            || entry.reason() != ScheduleChangeReason::DependencyDelay
    });
    if let Some(entry) = unexplained {
        return Err(eyre::eyre!("unexpected history entry {entry:?}"));
    }
    Ok(())
}

#[then(r#""{name}" traces its delay back to "{cause}""#)]
fn traces_delay_back(
    world: &ScheduleWorld,
    name: String,
    cause: String,
) -> Result<(), eyre::Report> {
    let chain = run_async(world.service.delay_chain(world.task_id(&name)?))?;
    if chain.root_cause() != Some(world.task_id(&cause)?) {
        return Err(eyre::eyre!("unexpected causal chain:\n{chain}"));
    }
    Ok(())
}

#[then("the dependency is rejected as a cycle")]
fn dependency_rejected_as_cycle(world: &ScheduleWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_dependency_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing dependency result"))?;
    if !matches!(
        result,
        Err(ScheduleServiceError::Engine(
            ScheduleEngineError::CycleDetected { .. }
        ))
    ) {
        return Err(eyre::eyre!("expected CycleDetected error, got {result:?}"));
    }
    Ok(())
}
