//! When steps for deferred write BDD scenarios.

use super::world::{WriteWorld, instant, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use taskdeck::task::services::{DeleteTaskRequest, UpdateTaskRequest};

#[when(r#"the task is marked done at "{timestamp}""#)]
fn mark_done(world: &mut WriteWorld, timestamp: String) -> Result<(), eyre::Report> {
    let request = UpdateTaskRequest::new(world.task_id()?, timestamp).with_done(true);
    world.last_write = Some(run_async(world.service.update(request)));
    Ok(())
}

#[when(r#"the task is retitled "{title}" at "{timestamp}""#)]
fn retitle(world: &mut WriteWorld, title: String, timestamp: String) -> Result<(), eyre::Report> {
    let request = UpdateTaskRequest::new(world.task_id()?, timestamp).with_title(title);
    world.last_write = Some(run_async(world.service.update(request)));
    Ok(())
}

#[when(r#"the task is deleted at "{timestamp}""#)]
fn delete(world: &mut WriteWorld, timestamp: String) -> Result<(), eyre::Report> {
    let request = DeleteTaskRequest::new(world.task_id()?, timestamp);
    world.last_write = Some(run_async(world.service.delete(request)));
    Ok(())
}

#[when(r#"the clock is moved to "{timestamp}""#)]
fn move_clock(world: &mut WriteWorld, timestamp: String) -> Result<(), eyre::Report> {
    world.clock.set(instant(&timestamp)?);
    Ok(())
}

#[when(r#"the deferred queue is processed at "{timestamp}""#)]
fn process_queue(world: &mut WriteWorld, timestamp: String) -> Result<(), eyre::Report> {
    world.clock.set(instant(&timestamp)?);
    run_async(world.processor.tick()).wrap_err("process deferred queue")?;
    Ok(())
}
