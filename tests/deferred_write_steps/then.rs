//! Then steps for deferred write BDD scenarios.

use super::world::{WriteWorld, run_async};
use rstest_bdd_macros::then;
use taskdeck::task::{
    domain::Task,
    ports::{TaskRepository, TaskRepositoryError, WriteOutcome},
    services::{TaskErrorKind, TaskServiceError},
};

fn current_task(world: &WriteWorld) -> Result<Task, eyre::Report> {
    run_async(world.service.get(world.task_id()?))
        .map_err(|err| eyre::eyre!("task lookup failed: {err}"))
}

#[then("the write is scheduled")]
fn write_is_scheduled(world: &WriteWorld) -> Result<(), eyre::Report> {
    match world.last_write.as_ref() {
        Some(Ok(WriteOutcome::Scheduled(_))) => Ok(()),
        other => Err(eyre::eyre!("expected a scheduled write, got {other:?}")),
    }
}

#[then("the write is rejected as stale")]
fn write_is_stale(world: &WriteWorld) -> Result<(), eyre::Report> {
    match world.last_write.as_ref() {
        Some(Err(TaskServiceError::Repository(TaskRepositoryError::StaleWrite { .. }))) => Ok(()),
        other => Err(eyre::eyre!("expected a stale write rejection, got {other:?}")),
    }
}

#[then(r#"the task title is "{title}""#)]
fn task_title_is(world: &WriteWorld, title: String) -> Result<(), eyre::Report> {
    let task = current_task(world)?;
    if task.title().as_str() != title {
        return Err(eyre::eyre!(
            "expected title {title:?}, found {:?}",
            task.title().as_str()
        ));
    }
    Ok(())
}

#[then("the task is done")]
fn task_is_done(world: &WriteWorld) -> Result<(), eyre::Report> {
    if !current_task(world)?.done() {
        return Err(eyre::eyre!("expected the task to be done"));
    }
    Ok(())
}

#[then("the task is not done")]
fn task_is_not_done(world: &WriteWorld) -> Result<(), eyre::Report> {
    if current_task(world)?.done() {
        return Err(eyre::eyre!("expected the task to still be open"));
    }
    Ok(())
}

#[then("the task no longer exists")]
fn task_is_gone(world: &WriteWorld) -> Result<(), eyre::Report> {
    match run_async(world.service.get(world.task_id()?)) {
        Err(err) if err.kind() == TaskErrorKind::NotFound => Ok(()),
        other => Err(eyre::eyre!("expected the task to be gone, got {other:?}")),
    }
}

#[then("no deferred operations remain")]
fn queue_is_empty(world: &WriteWorld) -> Result<(), eyre::Report> {
    let pending = run_async(world.repository.pending_operations())
        .map_err(|err| eyre::eyre!("pending lookup failed: {err}"))?;
    if !pending.is_empty() {
        return Err(eyre::eyre!(
            "expected an empty queue, found {} operations",
            pending.len()
        ));
    }
    Ok(())
}
