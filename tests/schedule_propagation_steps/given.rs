//! Given steps for schedule propagation BDD scenarios.

use super::world::{ScheduleWorld, day, run_async};
use eyre::WrapErr;
use planwright::schedule::{
    domain::ScheduledTask,
    ports::TaskGraphRepository,
    services::{AddDependencyRequest, CompleteTaskRequest},
};
use rstest_bdd_macros::given;

#[given(r#"a task "{name}" planned from day {start:u32} to day {end:u32}"#)]
fn planned_task(
    world: &mut ScheduleWorld,
    name: String,
    start: u32,
    end: u32,
) -> Result<(), eyre::Report> {
    let task = ScheduledTask::planned(world.project, day(start)?, day(end)?)?;
    run_async(world.store.store_task(&task)).wrap_err("store scenario task")?;
    world.tasks.insert(name, task.id());
    Ok(())
}

#[given(r#"the task "{name}" has started on day {offset:u32}"#)]
fn task_has_started(
    world: &mut ScheduleWorld,
    name: String,
    offset: u32,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&name)?;
    let mut task = run_async(world.store.find_task(task_id))?
        .ok_or_else(|| eyre::eyre!("task {name} missing from store"))?;
    task.start(day(offset)?)?;
    run_async(world.store.update_task(&task)).wrap_err("record scenario task start")?;
    Ok(())
}

#[given(r#""{dependent}" depends on "{blocker}""#)]
fn depends_on(
    world: &mut ScheduleWorld,
    dependent: String,
    blocker: String,
) -> Result<(), eyre::Report> {
    let request = AddDependencyRequest::new(world.task_id(&dependent)?, world.task_id(&blocker)?);
    run_async(world.service.add_dependency(request)).wrap_err("add scenario dependency")?;
    Ok(())
}

#[given(r#""{name}" was completed on day {offset:u32}"#)]
fn was_completed(world: &mut ScheduleWorld, name: String, offset: u32) -> Result<(), eyre::Report> {
    let request = CompleteTaskRequest::new(world.task_id(&name)?).with_actual_end(day(offset)?);
    run_async(world.service.complete_task(request)).wrap_err("complete scenario task")?;
    Ok(())
}
