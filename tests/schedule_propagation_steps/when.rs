//! When steps for schedule propagation BDD scenarios.

use super::world::{ScheduleWorld, day, run_async};
use eyre::WrapErr;
use planwright::schedule::{
    ports::TaskGraphRepository,
    services::{AddDependencyRequest, CompleteTaskRequest, OverrideScheduleRequest},
};
use rstest_bdd_macros::when;

#[when(r#""{name}" is completed on day {offset:u32}"#)]
fn task_is_completed(
    world: &mut ScheduleWorld,
    name: String,
    offset: u32,
) -> Result<(), eyre::Report> {
    let request = CompleteTaskRequest::new(world.task_id(&name)?).with_actual_end(day(offset)?);
    run_async(world.service.complete_task(request)).wrap_err("complete task")?;
    Ok(())
}

#[when(r#""{name}" is rescheduled to end on day {offset:u32}"#)]
fn task_is_rescheduled(
    world: &mut ScheduleWorld,
    name: String,
    offset: u32,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&name)?;
    let task = run_async(world.store.find_task(task_id))?
        .ok_or_else(|| eyre::eyre!("task {name} missing from store"))?;
    let start = task
        .expected_start()
        .ok_or_else(|| eyre::eyre!("task {name} has no planned start"))?;
    let request = OverrideScheduleRequest::new(task_id, start, day(offset)?);
    run_async(world.service.override_schedule(request)).wrap_err("reschedule task")?;
    Ok(())
}

#[when(r#""{dependent}" is made to depend on "{blocker}""#)]
fn made_to_depend(
    world: &mut ScheduleWorld,
    dependent: String,
    blocker: String,
) -> Result<(), eyre::Report> {
    let request = AddDependencyRequest::new(world.task_id(&dependent)?, world.task_id(&blocker)?);
    world.last_dependency_result = Some(run_async(world.service.add_dependency(request)));
    Ok(())
}
